use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

use crate::dao::models::{TeamScoreSummary, UserInfo};

/// Result alias for data access operations.
pub type AccessResult<T> = Result<T, AccessError>;

/// Error raised by the data access capability regardless of the transport used.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    /// No usable credential exists, even after a silent reload attempt.
    #[error("not authenticated: {0}")]
    Unauthenticated(String),
    /// The remote database refused access to the requested data.
    #[error("access denied: {0}")]
    Denied(String),
    /// The remote side was unreachable or answered with something unusable.
    #[error("remote data unavailable: {0}")]
    Unavailable(String),
    /// The remote side rejected the caller-provided input.
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Typed read access to the remote competition database plus the login flow.
///
/// Every data method transparently makes sure a valid credential is held first
/// (reloading the persisted refresh credential once when none is in memory).
pub trait DataAccess: Send + Sync {
    /// Raw `events` map of a region keyed by event id.
    fn region_events(&self, region: String) -> BoxFuture<'static, AccessResult<Value>>;
    /// Sorted region keys known to the remote database.
    fn list_regions(&self) -> BoxFuture<'static, AccessResult<Vec<String>>>;
    /// Per-team score summaries of an event, in source order.
    fn team_scores_summary(
        &self,
        region: String,
        event_id: String,
    ) -> BoxFuture<'static, AccessResult<Vec<TeamScoreSummary>>>;
    /// Raw `games/sessions` map of an event keyed by session id.
    fn event_sessions(
        &self,
        region: String,
        event_id: String,
    ) -> BoxFuture<'static, AccessResult<Value>>;
    /// Raw matches of one session.
    fn session_matches(
        &self,
        region: String,
        event_id: String,
        session_id: String,
    ) -> BoxFuture<'static, AccessResult<Value>>;
    /// Ask the identity provider to email a magic link to `email`.
    fn request_login_challenge(&self, email: String) -> BoxFuture<'static, AccessResult<()>>;
    /// Exchange a magic link for a credential and keep it in memory.
    ///
    /// Returns the refresh token so the caller can persist it.
    fn complete_login(
        &self,
        email: String,
        magic_link: String,
    ) -> BoxFuture<'static, AccessResult<String>>;
    /// Look up the signed-in user.
    fn user_info(&self) -> BoxFuture<'static, AccessResult<UserInfo>>;
    /// Reload the persisted refresh credential and exchange it for a fresh one.
    fn reload_credential(&self) -> BoxFuture<'static, AccessResult<()>>;
    /// Forget the in-memory credential.
    fn sign_out(&self) -> BoxFuture<'static, ()>;
}
