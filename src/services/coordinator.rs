//! Command dispatch for display connections.
//!
//! Every inbound command is executed, then its outcome is committed and
//! delivered according to the scope table in [`ClientCommand::scope`]. This
//! module is the error boundary: a failed command is answered to its sender
//! and never broadcast.

use tracing::{debug, info, warn};

use crate::{
    dto::ws::{
        ActionResult, AuthErrorPayload, ClientCommand, ConnectionEstablished, ErrorPayload,
        InboundEnvelope, OutboundEvent, ServerEvent,
    },
    error::ServiceError,
    services::{auth_service, data_service, display_service},
    state::{
        SharedState,
        display::{StateField, StatePatch},
        registry::{ConnectionHandle, ConnectionId, Role},
    },
};

/// Recipients of the events produced by a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Only the connection that sent the command.
    Sender,
    /// Every open connection.
    All,
}

impl ClientCommand {
    /// Broadcast scope of the command's events.
    pub fn scope(&self) -> Scope {
        match self {
            ClientCommand::RegisterRole(_) => Scope::All,
            ClientCommand::SetOverlay(_) => Scope::All,
            ClientCommand::SetEvent(_) => Scope::All,
            ClientCommand::RequestEventInfo => Scope::Sender,
            ClientCommand::TimerUpdate(_) => Scope::All,
            ClientCommand::LoadEvents(_) => Scope::Sender,
            ClientCommand::ListRegions => Scope::Sender,
            // every display's "last updated" label moves together
            ClientCommand::RequestRankings => Scope::All,
            ClientCommand::RequestSchedule => Scope::Sender,
            ClientCommand::RequestScores => Scope::Sender,
            ClientCommand::RequestSessionMatches(_) => Scope::Sender,
            ClientCommand::RequestMagicLink(_) => Scope::Sender,
            ClientCommand::CompleteLogin(_) => Scope::All,
            ClientCommand::RequestUserInfo => Scope::Sender,
            ClientCommand::Logout => Scope::All,
            ClientCommand::SetActiveSession(_) => Scope::All,
            ClientCommand::RequestActiveSession => Scope::Sender,
            ClientCommand::RequestTeamName(_) => Scope::Sender,
        }
    }
}

/// Shared mutation applied when a command's outcome is committed.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Merge a patch into the shared display state.
    Display(StatePatch),
    /// Record whether a usable credential is held. Every connection is told
    /// about the new value only when it differs from the stored one.
    Authenticated(bool),
    /// Register the sender under a role; the new counts are appended to the events.
    Register(Role),
}

/// Result of executing a command, before it is committed.
#[derive(Debug, Default)]
pub struct Outcome {
    /// Applied before any event is delivered.
    pub mutation: Option<Mutation>,
    /// Delivered according to the command's [`Scope`].
    pub events: Vec<OutboundEvent>,
    /// Delivered to the sender only, after `events`.
    pub ack: Option<OutboundEvent>,
}

impl Outcome {
    /// A single event and no mutation.
    pub fn event(event: OutboundEvent) -> Self {
        Self {
            events: vec![event],
            ..Self::default()
        }
    }

    /// A mutation announced by `events`.
    pub fn mutate(mutation: Mutation, events: Vec<OutboundEvent>) -> Self {
        Self {
            mutation: Some(mutation),
            events,
            ack: None,
        }
    }

    /// Add a reply for the sender, delivered last.
    pub fn with_ack(mut self, ack: OutboundEvent) -> Self {
        self.ack = Some(ack);
        self
    }
}

/// Track a new connection and send it the current shared state.
pub async fn on_connect(state: &SharedState, handle: ConnectionHandle) {
    let id = handle.id;
    let _gate = state.hold_broadcasts().await;
    state.registry().attach(handle);

    let snapshot = state.display().get().await;
    let counts = state.registry().counts_by_role().await;
    let initial = [
        OutboundEvent::new(
            ServerEvent::ConnectionEstablished,
            &ConnectionEstablished { client_id: id },
        ),
        display_service::overlay_selection(snapshot.overlay),
        display_service::auth_status(snapshot.authenticated),
        display_service::active_session(snapshot.active_session),
        display_service::role_counts(&counts),
    ];
    for event in initial {
        state.emit_to(id, event);
    }
    info!(id = %id, "client connected");
}

/// Forget a closed connection and announce the new role counts.
pub async fn on_disconnect(state: &SharedState, id: ConnectionId) {
    let _gate = state.hold_broadcasts().await;
    let counts = state.registry().detach(id).await;
    state.emit_to_all(display_service::role_counts(&counts));
    info!(id = %id, "client disconnected");
}

/// Handle one raw text frame received from `id`.
pub async fn on_message(state: &SharedState, id: ConnectionId, text: &str) {
    let envelope = match InboundEnvelope::from_json_str(text) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(id = %id, error = %err, "failed to parse client message");
            state.emit_to(id, error_reply("unknown", &err));
            return;
        }
    };

    let name = envelope.event.clone();
    let result = match ClientCommand::from_envelope(envelope) {
        Ok(command) => dispatch(state, id, command).await,
        Err(err) => Err(err),
    };

    if let Err(err) = result {
        warn!(id = %id, command = %name, error = %err, "command failed");
        let reply = error_reply(&name, &err);
        match err {
            ServiceError::Auth(_) => {
                let outcome = Outcome::mutate(Mutation::Authenticated(false), Vec::new());
                commit(state, id, Scope::Sender, outcome.with_ack(reply)).await;
            }
            _ => state.emit_to(id, reply),
        }
    }
}

/// Execute `command` for connection `id` and deliver its outcome.
pub async fn dispatch(
    state: &SharedState,
    id: ConnectionId,
    command: ClientCommand,
) -> Result<(), ServiceError> {
    let scope = command.scope();
    let name = command.name();
    debug!(id = %id, command = name, "dispatching command");

    let outcome = execute(state, command).await?;
    commit(state, id, scope, outcome).await;
    Ok(())
}

async fn execute(state: &SharedState, command: ClientCommand) -> Result<Outcome, ServiceError> {
    match command {
        ClientCommand::RegisterRole(request) => Ok(display_service::register_role(request)),
        ClientCommand::SetOverlay(request) => Ok(display_service::set_overlay(request)),
        ClientCommand::SetEvent(request) => Ok(display_service::set_event(state, request).await),
        ClientCommand::RequestEventInfo => Ok(display_service::event_info(state).await),
        ClientCommand::TimerUpdate(payload) => Ok(display_service::timer_update(payload)),
        ClientCommand::SetActiveSession(request) => {
            Ok(display_service::set_active_session(request))
        }
        ClientCommand::RequestActiveSession => {
            Ok(display_service::current_active_session(state).await)
        }
        ClientCommand::LoadEvents(request) => Ok(data_service::load_events(state, request).await),
        ClientCommand::ListRegions => data_service::list_regions(state).await,
        ClientCommand::RequestRankings => data_service::rankings(state).await,
        ClientCommand::RequestSchedule => data_service::schedule(state).await,
        ClientCommand::RequestScores => data_service::scores(state).await,
        ClientCommand::RequestSessionMatches(request) => {
            data_service::session_matches(state, request).await
        }
        ClientCommand::RequestTeamName(request) => data_service::team_name(state, request).await,
        ClientCommand::RequestMagicLink(request) => {
            auth_service::request_magic_link(state, request).await
        }
        ClientCommand::CompleteLogin(request) => auth_service::complete_login(state, request).await,
        ClientCommand::RequestUserInfo => auth_service::user_info(state).await,
        ClientCommand::Logout => Ok(auth_service::logout(state).await),
    }
}

/// Apply the outcome's mutation and deliver its events under the broadcast gate.
async fn commit(state: &SharedState, id: ConnectionId, scope: Scope, outcome: Outcome) {
    let Outcome {
        mutation,
        mut events,
        ack,
    } = outcome;

    let _gate = state.hold_broadcasts().await;
    match mutation {
        Some(Mutation::Display(patch)) => {
            state.display().set(patch).await;
        }
        Some(Mutation::Authenticated(authenticated)) => {
            let change = state
                .display()
                .set(StatePatch::authenticated(authenticated))
                .await;
            if change.changed.contains(&StateField::Authenticated) {
                info!(authenticated, "authentication state changed");
                state.emit_to_all(display_service::auth_status(authenticated));
            }
        }
        Some(Mutation::Register(role)) => {
            let counts = state.registry().register(id, role).await;
            info!(id = %id, role = ?role, "client registered");
            events.push(display_service::role_counts(&counts));
        }
        None => {}
    }

    for event in events {
        match scope {
            Scope::Sender => state.emit_to(id, event),
            Scope::All => state.emit_to_all(event),
        }
    }
    if let Some(ack) = ack {
        state.emit_to(id, ack);
    }
}

/// Shape a failure of `command` into the reply sent back to its sender.
fn error_reply(command: &str, err: &ServiceError) -> OutboundEvent {
    match (command, err) {
        ("request_magic_link", _) => OutboundEvent::new(
            ServerEvent::MagicLinkResult,
            &ActionResult::failed(err.to_string()),
        ),
        ("complete_login", _) => {
            OutboundEvent::new(ServerEvent::LoginResult, &ActionResult::failed(err.to_string()))
        }
        (_, ServiceError::Auth(reason)) => OutboundEvent::new(
            ServerEvent::AuthError,
            &AuthErrorPayload {
                error: reason.clone(),
                command: command.to_string(),
            },
        ),
        _ => OutboundEvent::new(
            ServerEvent::Error,
            &ErrorPayload {
                error: err.to_string(),
                kind: err.kind(),
                command: command.to_string(),
            },
        ),
    }
}
