//! Health check payload.

use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always "ok" while the server answers.
    pub status: String,
    /// Whether a remote database credential is currently held.
    pub authenticated: bool,
    /// Number of open WebSocket connections.
    pub connections: usize,
}

impl HealthResponse {
    /// Healthy response with the current auth flag and connection count.
    pub fn ok(authenticated: bool, connections: usize) -> Self {
        Self {
            status: "ok".to_string(),
            authenticated,
            connections,
        }
    }
}
