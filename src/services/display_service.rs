use serde_json::Value;
use tracing::{info, warn};

use crate::{
    dto::ws::{
        ActiveSessionPayload, ActiveSessionRequest, AuthStatus, EventInfo, OutboundEvent,
        OverlaySelection, RegisterRoleRequest, ServerEvent, SetEventRequest, SetOverlayRequest,
    },
    services::coordinator::{Mutation, Outcome},
    state::{
        SharedState,
        display::{DisplayState, Overlay, StatePatch},
        registry::RoleCounts,
    },
};

/// `overlay_selection` message.
pub fn overlay_selection(overlay: Overlay) -> OutboundEvent {
    OutboundEvent::new(ServerEvent::OverlaySelection, &OverlaySelection { screen: overlay })
}

/// `auth_status` message.
pub fn auth_status(authenticated: bool) -> OutboundEvent {
    OutboundEvent::new(ServerEvent::AuthStatus, &AuthStatus { authenticated })
}

/// `active_session` message.
pub fn active_session(session_id: Option<String>) -> OutboundEvent {
    OutboundEvent::new(ServerEvent::ActiveSession, &ActiveSessionPayload { session_id })
}

/// `role_counts` message.
pub fn role_counts(counts: &RoleCounts) -> OutboundEvent {
    OutboundEvent::new(ServerEvent::RoleCounts, counts)
}

fn event_info_event(region: String, event_id: String, event_name: Option<String>) -> OutboundEvent {
    OutboundEvent::new(
        ServerEvent::EventInfo,
        &EventInfo {
            region,
            event_id,
            event_name,
        },
    )
}

/// Register the sender under a role; the counts are broadcast on commit.
pub fn register_role(request: RegisterRoleRequest) -> Outcome {
    Outcome::mutate(Mutation::Register(request.role), Vec::new())
}

/// Select the overlay shown on the audience display.
pub fn set_overlay(request: SetOverlayRequest) -> Outcome {
    let patch = StatePatch::overlay(request.screen.as_deref().unwrap_or_default());
    let overlay = patch.overlay.unwrap_or_default();
    info!(overlay = overlay.as_str(), "overlay selected");
    Outcome::mutate(Mutation::Display(patch), vec![overlay_selection(overlay)])
}

/// Switch to another event. The human-readable name is looked up on a best-effort basis.
pub async fn set_event(state: &SharedState, request: SetEventRequest) -> Outcome {
    let SetEventRequest { region, event_id } = request;
    let event_name = lookup_event_name(state, &region, &event_id).await;
    info!(region = %region, event_id = %event_id, event_name = ?event_name, "event selected");

    let patch = StatePatch::event(region.clone(), event_id.clone(), event_name.clone());
    Outcome::mutate(
        Mutation::Display(patch),
        vec![event_info_event(region, event_id, event_name)],
    )
}

async fn lookup_event_name(state: &SharedState, region: &str, event_id: &str) -> Option<String> {
    match state.access().region_events(region.to_string()).await {
        Ok(events) => event_name_from(&events, event_id),
        Err(err) => {
            warn!(region = %region, event_id = %event_id, error = %err, "could not fetch event name");
            None
        }
    }
}

/// Name of `event_id` inside a region's raw event map, falling back to the id itself
/// when the record carries no name.
fn event_name_from(events: &Value, event_id: &str) -> Option<String> {
    let record = events.get(event_id)?.as_object()?;
    let name = record
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(event_id);
    Some(name.to_string())
}

/// Describe the selected event to the sender.
pub async fn event_info(state: &SharedState) -> Outcome {
    let DisplayState {
        region,
        event_id,
        event_name,
        ..
    } = state.display().get().await;
    Outcome::event(event_info_event(region, event_id, event_name))
}

/// Relay a timer tick as is.
pub fn timer_update(payload: Value) -> Outcome {
    Outcome::event(OutboundEvent::new(ServerEvent::TimerData, &payload))
}

/// Select the active session. A blank id clears it.
pub fn set_active_session(request: ActiveSessionRequest) -> Outcome {
    let session_id = request
        .session_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());
    info!(session_id = ?session_id, "active session selected");
    Outcome::mutate(
        Mutation::Display(StatePatch::active_session(session_id.clone())),
        vec![active_session(session_id)],
    )
}

/// Report the active session to the sender.
pub async fn current_active_session(state: &SharedState) -> Outcome {
    Outcome::event(active_session(state.display().get().await.active_session))
}
