/// Magic-link login, user lookup and logout commands.
pub mod auth_service;
/// Command dispatch, broadcast scoping and the per-command error boundary.
pub mod coordinator;
/// Remote data reads: events, rankings, schedule, scores, team names.
pub mod data_service;
/// Overlay, event, timer and session commands.
pub mod display_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Mirrors event selection changes to disk.
pub mod persistence;
/// WebSocket connection handling.
pub mod websocket_service;

#[cfg(test)]
pub(crate) mod test_support;
