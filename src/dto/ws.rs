//! WebSocket message envelopes, inbound commands and outbound payloads.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    dao::models::{ScheduleEntry, TeamScoreSummary},
    dto::validation::validate_path_segment,
    error::{ErrorKind, ServiceError},
    state::{display::Overlay, registry::Role},
};

/// Envelope wrapping every WebSocket text frame, in both directions.
#[derive(Debug, Deserialize, ToSchema)]
pub struct InboundEnvelope {
    /// Command name.
    pub event: String,
    /// Command payload; may be omitted or `null` for commands without one.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: Value,
}

impl InboundEnvelope {
    /// Parse a raw text frame.
    pub fn from_json_str(text: &str) -> Result<Self, ServiceError> {
        serde_json::from_str(text)
            .map_err(|err| ServiceError::Validation(format!("malformed message: {err}")))
    }
}

/// A parsed and validated command received from a client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    /// `register_role`
    RegisterRole(RegisterRoleRequest),
    /// `set_overlay`
    SetOverlay(SetOverlayRequest),
    /// `set_event`
    SetEvent(SetEventRequest),
    /// `request_event_info`
    RequestEventInfo,
    /// Timer payloads are relayed verbatim.
    TimerUpdate(Value),
    /// `load_events`
    LoadEvents(LoadEventsRequest),
    /// `list_regions`
    ListRegions,
    /// `request_rankings`
    RequestRankings,
    /// `request_schedule`
    RequestSchedule,
    /// `request_scores`
    RequestScores,
    /// `request_session_matches`
    RequestSessionMatches(SessionMatchesRequest),
    /// `request_magic_link`
    RequestMagicLink(MagicLinkRequest),
    /// `complete_login`
    CompleteLogin(CompleteLoginRequest),
    /// `request_user_info`
    RequestUserInfo,
    /// `logout`
    Logout,
    /// `set_active_session`
    SetActiveSession(ActiveSessionRequest),
    /// `request_active_session`
    RequestActiveSession,
    /// `request_team_name`
    RequestTeamName(TeamNameRequest),
}

impl ClientCommand {
    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::RegisterRole(_) => "register_role",
            ClientCommand::SetOverlay(_) => "set_overlay",
            ClientCommand::SetEvent(_) => "set_event",
            ClientCommand::RequestEventInfo => "request_event_info",
            ClientCommand::TimerUpdate(_) => "timer_update",
            ClientCommand::LoadEvents(_) => "load_events",
            ClientCommand::ListRegions => "list_regions",
            ClientCommand::RequestRankings => "request_rankings",
            ClientCommand::RequestSchedule => "request_schedule",
            ClientCommand::RequestScores => "request_scores",
            ClientCommand::RequestSessionMatches(_) => "request_session_matches",
            ClientCommand::RequestMagicLink(_) => "request_magic_link",
            ClientCommand::CompleteLogin(_) => "complete_login",
            ClientCommand::RequestUserInfo => "request_user_info",
            ClientCommand::Logout => "logout",
            ClientCommand::SetActiveSession(_) => "set_active_session",
            ClientCommand::RequestActiveSession => "request_active_session",
            ClientCommand::RequestTeamName(_) => "request_team_name",
        }
    }

    /// Parse the payload of `envelope` according to its command name.
    pub fn from_envelope(envelope: InboundEnvelope) -> Result<Self, ServiceError> {
        let InboundEnvelope { event, data } = envelope;
        let command = match event.as_str() {
            "register_role" => ClientCommand::RegisterRole(payload(data)?),
            "set_overlay" => ClientCommand::SetOverlay(payload(data)?),
            "set_event" => ClientCommand::SetEvent(payload(data)?),
            "request_event_info" => ClientCommand::RequestEventInfo,
            "timer_update" => ClientCommand::TimerUpdate(data),
            "load_events" => ClientCommand::LoadEvents(payload(data)?),
            "list_regions" => ClientCommand::ListRegions,
            "request_rankings" => ClientCommand::RequestRankings,
            "request_schedule" => ClientCommand::RequestSchedule,
            "request_scores" => ClientCommand::RequestScores,
            "request_session_matches" => ClientCommand::RequestSessionMatches(payload(data)?),
            "request_magic_link" => ClientCommand::RequestMagicLink(payload(data)?),
            "complete_login" => ClientCommand::CompleteLogin(payload(data)?),
            "request_user_info" => ClientCommand::RequestUserInfo,
            "logout" => ClientCommand::Logout,
            "set_active_session" => ClientCommand::SetActiveSession(payload(data)?),
            "request_active_session" => ClientCommand::RequestActiveSession,
            "request_team_name" => ClientCommand::RequestTeamName(payload(data)?),
            other => {
                return Err(ServiceError::Validation(format!("unknown command `{other}`")));
            }
        };
        Ok(command)
    }
}

/// Deserialize and validate a command payload. A missing payload reads as an empty object.
fn payload<T>(data: Value) -> Result<T, ServiceError>
where
    T: DeserializeOwned + Validate,
{
    let data = if data.is_null() {
        Value::Object(Map::new())
    } else {
        data
    };
    let payload: T = serde_json::from_value(data)
        .map_err(|err| ServiceError::Validation(format!("invalid payload: {err}")))?;
    payload.validate()?;
    Ok(payload)
}

/// Payload of `register_role`.
#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema, Validate)]
pub struct RegisterRoleRequest {
    /// Role the sending connection plays from now on.
    pub role: Role,
}

/// Payload of `set_overlay`.
#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema, Validate)]
pub struct SetOverlayRequest {
    /// Overlay identifier; unknown or missing values select the match overlay.
    #[serde(default)]
    pub screen: Option<String>,
}

/// Payload of `set_event`.
#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema, Validate)]
pub struct SetEventRequest {
    /// Region key.
    #[validate(custom(function = "validate_path_segment"))]
    pub region: String,
    /// Event key inside the region.
    #[validate(custom(function = "validate_path_segment"))]
    pub event_id: String,
}

/// Payload of `load_events`.
#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema, Validate)]
pub struct LoadEventsRequest {
    /// Defaults to the currently selected region.
    #[serde(default)]
    #[validate(custom(function = "validate_path_segment"))]
    pub region: Option<String>,
}

/// Payload of `request_session_matches`.
#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema, Validate)]
pub struct SessionMatchesRequest {
    /// Session key inside the selected event.
    #[validate(custom(function = "validate_path_segment"))]
    pub session_id: String,
}

/// Payload of `request_magic_link`.
#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema, Validate)]
pub struct MagicLinkRequest {
    /// Address the magic link is emailed to.
    #[validate(email)]
    pub email: String,
}

/// Payload of `complete_login`.
#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema, Validate)]
pub struct CompleteLoginRequest {
    /// Address the magic link was sent to.
    #[validate(email)]
    pub email: String,
    /// Full magic-link URL as received by email.
    #[validate(url)]
    pub magic_link: String,
}

/// Payload of `set_active_session`.
#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema, Validate)]
pub struct ActiveSessionRequest {
    /// `null` or omitted clears the active session.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Team-name lookup; the number may be sent as a JSON string or number.
#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema)]
pub struct TeamNameRequest {
    /// Team number to look up.
    #[schema(value_type = String)]
    pub team_number: Value,
}

impl TeamNameRequest {
    /// The team number compared as a trimmed string.
    pub fn normalized(&self) -> String {
        normalize_team_number(&self.team_number).unwrap_or_default()
    }
}

impl Validate for TeamNameRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if normalize_team_number(&self.team_number).is_none() {
            let mut err = ValidationError::new("team_number");
            err.message = Some("team_number must be a non-empty string or a number".into());
            errors.add("team_number", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// String form of a team number as stored remotely (string or number).
pub fn normalize_team_number(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Names of the messages pushed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerEvent {
    /// First message on every connection, carrying its id.
    ConnectionEstablished,
    /// Currently selected overlay.
    OverlaySelection,
    /// Whether a usable credential is held.
    AuthStatus,
    /// Currently active session.
    ActiveSession,
    /// Number of connections per role.
    RoleCounts,
    /// Selected region and event.
    EventInfo,
    /// Relayed timer payload.
    TimerData,
    /// Events of a region.
    EventsList,
    /// Known regions.
    RegionsList,
    /// Teams sorted by high score.
    RankingsData,
    /// Sessions sorted by start time.
    ScheduleData,
    /// Team scores in source order.
    ScoresData,
    /// Matches of one session.
    SessionMatches,
    /// Outcome of a magic-link request.
    MagicLinkResult,
    /// Outcome of a magic-link login.
    LoginResult,
    /// Signed-in user.
    UserInfo,
    /// Name of a team.
    TeamName,
    /// A command needed a credential.
    AuthError,
    /// Any other command failure.
    Error,
}

impl ServerEvent {
    /// Wire name of the message.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerEvent::ConnectionEstablished => "connection_established",
            ServerEvent::OverlaySelection => "overlay_selection",
            ServerEvent::AuthStatus => "auth_status",
            ServerEvent::ActiveSession => "active_session",
            ServerEvent::RoleCounts => "role_counts",
            ServerEvent::EventInfo => "event_info",
            ServerEvent::TimerData => "timer_data",
            ServerEvent::EventsList => "events_list",
            ServerEvent::RegionsList => "regions_list",
            ServerEvent::RankingsData => "rankings_data",
            ServerEvent::ScheduleData => "schedule_data",
            ServerEvent::ScoresData => "scores_data",
            ServerEvent::SessionMatches => "session_matches",
            ServerEvent::MagicLinkResult => "magic_link_result",
            ServerEvent::LoginResult => "login_result",
            ServerEvent::UserInfo => "user_info",
            ServerEvent::TeamName => "team_name",
            ServerEvent::AuthError => "auth_error",
            ServerEvent::Error => "error",
        }
    }
}

/// A message ready to be delivered to one or more connections.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct OutboundEvent {
    /// Message name.
    pub event: String,
    /// Message payload.
    #[schema(value_type = Object)]
    pub data: Value,
}

impl OutboundEvent {
    /// Build an event from any serializable payload.
    ///
    /// A payload that fails to serialize is logged and sent as `null`.
    pub fn new<T>(event: ServerEvent, payload: &T) -> Self
    where
        T: ?Sized + Serialize,
    {
        let data = serde_json::to_value(payload).unwrap_or_else(|err| {
            warn!(event = event.as_str(), error = %err, "failed to serialize outbound payload");
            Value::Null
        });
        Self {
            event: event.as_str().to_string(),
            data,
        }
    }

    /// Text frame carrying this event.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Payload of `connection_established`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectionEstablished {
    /// Identifier assigned to the connection.
    pub client_id: Uuid,
}

/// Payload of `overlay_selection`.
#[derive(Debug, Serialize, ToSchema)]
pub struct OverlaySelection {
    /// Overlay every display should show.
    pub screen: Overlay,
}

/// Payload of `auth_status`.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthStatus {
    /// Whether the back end holds a usable credential.
    pub authenticated: bool,
}

/// Payload of `active_session`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActiveSessionPayload {
    /// Active session, `null` when none is selected.
    pub session_id: Option<String>,
}

/// Payload of `event_info`.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventInfo {
    /// Selected region.
    pub region: String,
    /// Selected event.
    pub event_id: String,
    /// Human readable event name, when known.
    pub event_name: Option<String>,
}

/// Reply to `load_events`; an unusable result is reported as an explicit marker.
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum EventsList {
    /// Raw events of `region`, keyed by event id.
    Events {
        /// Event records keyed by event id.
        #[schema(value_type = Object)]
        events: Value,
        /// Region the events belong to.
        region: String,
    },
    /// No usable event list could be read.
    Unavailable {
        /// Why the list is missing.
        error: String,
    },
}

/// Payload of `regions_list`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RegionsList {
    /// Sorted region keys.
    pub regions: Vec<String>,
}

/// Payload of `rankings_data`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RankingsData {
    /// Teams by high score, highest first.
    pub rankings: Vec<TeamScoreSummary>,
    /// RFC 3339 timestamp of the refresh.
    pub updated_at: String,
}

/// Payload of `schedule_data`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScheduleData {
    /// Sessions by start time.
    pub schedule: Vec<ScheduleEntry>,
}

/// Payload of `scores_data`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScoresData {
    /// Team summaries in source order.
    pub scores: Vec<TeamScoreSummary>,
}

/// Payload of `session_matches`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionMatches {
    /// Session the matches belong to.
    pub session_id: String,
    /// Raw match records.
    #[schema(value_type = Object)]
    pub matches: Value,
}

/// Outcome of a login step (`magic_link_result`, `login_result`).
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResult {
    /// Whether the step succeeded.
    pub success: bool,
    /// Failure reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    /// Successful step.
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// Failed step with its reason.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Payload of `user_info`.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserInfoPayload {
    /// Whether a user is signed in.
    pub authenticated: bool,
    /// Identity provider user id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Email of the signed-in user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserInfoPayload {
    /// Nobody is signed in.
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            user_id: None,
            email: None,
        }
    }
}

/// Payload of `team_name`.
#[derive(Debug, Serialize, ToSchema)]
pub struct TeamName {
    /// Team number as requested, normalized to a string.
    pub team_number: String,
    /// Team name, or `Team {number}` when the team is unknown.
    pub name: String,
}

/// Reply sent when a command needs a credential that could not be obtained.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthErrorPayload {
    /// Why no credential is available.
    pub error: String,
    /// Name of the failed command.
    pub command: String,
}

/// Generic failure reply sent to the originating connection.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorPayload {
    /// Failure description.
    pub error: String,
    /// Failure class.
    pub kind: ErrorKind,
    /// Name of the failed command, `unknown` when the frame could not be parsed.
    pub command: String,
}
