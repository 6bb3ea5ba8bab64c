use crate::{dto::health::HealthResponse, state::SharedState};

/// Summarize the live state for the health endpoint.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let authenticated = state.display().get().await.authenticated;
    HealthResponse::ok(authenticated, state.registry().connection_count())
}
