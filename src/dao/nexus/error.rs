//! Error types shared by the remote database and identity provider client.

use reqwest::StatusCode;
use thiserror::Error;

use crate::dao::{
    access::AccessError,
    storage::StorageError,
};

/// Convenient result alias returning [`NexusDaoError`] failures.
pub type NexusResult<T> = Result<T, NexusDaoError>;

/// Failures that can occur while talking to the remote database or identity provider.
#[derive(Debug, Error)]
pub enum NexusDaoError {
    /// Required environment variable is missing.
    #[error("missing Nexus environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build Nexus HTTP client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// The configured database URL cannot address nodes.
    #[error("invalid Nexus database URL `{url}`: {reason}")]
    InvalidDatabaseUrl { url: String, reason: String },
    /// No credential is held and none could be reloaded.
    #[error("not authenticated: {reason}")]
    NotAuthenticated { reason: String },
    /// The persisted refresh token could not be read.
    #[error("failed to load the persisted credential")]
    CredentialStore(#[source] StorageError),
    /// The identity provider rejected a token refresh.
    #[error("token refresh rejected with status {status}: {body}")]
    RefreshRejected { status: StatusCode, body: String },
    /// A request could not be sent.
    #[error("failed to send Nexus request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The database answered 401: the credential is invalid or lacks permission.
    #[error("permission denied for path `/{path}`: {message}")]
    Unauthorized { path: String, message: String },
    /// Any other non-success status.
    #[error("unexpected Nexus response status {status} for `{path}`: {body}")]
    RequestStatus {
        path: String,
        status: StatusCode,
        body: String,
    },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode Nexus response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// Token response carried a non-numeric expiry.
    #[error("invalid token expiry `{value}`")]
    InvalidExpiry { value: String },
    /// The magic link did not carry an `oobCode` query parameter.
    #[error("magic link is missing its sign-in code")]
    InvalidMagicLink,
}

impl From<NexusDaoError> for AccessError {
    fn from(err: NexusDaoError) -> Self {
        match err {
            NexusDaoError::NotAuthenticated { reason } => AccessError::Unauthenticated(reason),
            NexusDaoError::RefreshRejected { .. } | NexusDaoError::CredentialStore(_) => {
                AccessError::Unauthenticated(err.to_string())
            }
            NexusDaoError::Unauthorized { .. } => AccessError::Denied(err.to_string()),
            NexusDaoError::InvalidMagicLink => AccessError::Rejected(err.to_string()),
            other => AccessError::Unavailable(other.to_string()),
        }
    }
}
