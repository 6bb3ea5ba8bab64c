//! Per-command errors reported back to clients.

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::dao::access::AccessError;

/// Errors a command can fail with. They are always answered to the originating
/// connection only and never broadcast.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Remote data could not be read (permission, availability, malformed payload).
    #[error("{0}")]
    Access(AccessError),
    /// No usable credential exists; the operator has to log in again.
    #[error("authentication required: {0}")]
    Auth(String),
    /// The inbound command or its payload was malformed; nothing was applied.
    #[error("invalid command: {0}")]
    Validation(String),
}

/// Coarse error classification exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`ServiceError::Access`].
    Access,
    /// See [`ServiceError::Auth`].
    Auth,
    /// See [`ServiceError::Validation`].
    Validation,
}

impl ServiceError {
    /// Classification sent alongside the message.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Access(_) => ErrorKind::Access,
            ServiceError::Auth(_) => ErrorKind::Auth,
            ServiceError::Validation(_) => ErrorKind::Validation,
        }
    }
}

impl From<AccessError> for ServiceError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Unauthenticated(reason) => ServiceError::Auth(reason),
            AccessError::Rejected(reason) => ServiceError::Validation(reason),
            other => ServiceError::Access(other),
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::Validation(format!("validation failed: {}", err))
    }
}
