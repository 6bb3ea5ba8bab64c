use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the display back end.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::ws::InboundEnvelope,
            crate::dto::ws::OutboundEvent,
            crate::dto::ws::RegisterRoleRequest,
            crate::dto::ws::SetOverlayRequest,
            crate::dto::ws::SetEventRequest,
            crate::dto::ws::LoadEventsRequest,
            crate::dto::ws::SessionMatchesRequest,
            crate::dto::ws::MagicLinkRequest,
            crate::dto::ws::CompleteLoginRequest,
            crate::dto::ws::ActiveSessionRequest,
            crate::dto::ws::TeamNameRequest,
            crate::dto::ws::ConnectionEstablished,
            crate::dto::ws::OverlaySelection,
            crate::dto::ws::AuthStatus,
            crate::dto::ws::ActiveSessionPayload,
            crate::dto::ws::EventInfo,
            crate::dto::ws::EventsList,
            crate::dto::ws::RegionsList,
            crate::dto::ws::RankingsData,
            crate::dto::ws::ScheduleData,
            crate::dto::ws::ScoresData,
            crate::dto::ws::SessionMatches,
            crate::dto::ws::ActionResult,
            crate::dto::ws::UserInfoPayload,
            crate::dto::ws::TeamName,
            crate::dto::ws::AuthErrorPayload,
            crate::dto::ws::ErrorPayload,
            crate::state::display::Overlay,
            crate::state::registry::Role,
            crate::state::registry::RoleCounts,
            crate::dao::models::TeamScoreSummary,
            crate::dao::models::ScheduleEntry,
            crate::error::ErrorKind,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "displays", description = "WebSocket channel shared by controllers and displays"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_routes_and_message_schemas() {
        let doc = ApiDoc::openapi();

        assert!(doc.paths.paths.contains_key("/ws"));
        assert!(doc.paths.paths.contains_key("/healthcheck"));
        let schemas = doc.components.expect("components").schemas;
        assert!(schemas.contains_key("InboundEnvelope"));
        assert!(schemas.contains_key("RankingsData"));
    }
}
