//! Shared overlay, event, session and auth values.

use serde::Serialize;
use tokio::sync::{RwLock, broadcast};
use utoipa::ToSchema;

use crate::dao::models::EventSelection;

/// Capacity of the state-change notification channel.
const CHANGE_CAPACITY: usize = 64;

/// Overlay screens the audience display knows how to render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum Overlay {
    /// Current match with its teams.
    #[default]
    MatchOverlay,
    /// Team rankings.
    RankingsOverlay,
    /// Upcoming sessions.
    ScheduleOverlay,
    /// Match timer.
    TimerOverlay,
    /// Sponsor slides.
    SponsorsOverlay,
    /// Nothing on screen.
    Blank,
}

impl Overlay {
    /// Every overlay, default first.
    pub const ALL: [Overlay; 6] = [
        Overlay::MatchOverlay,
        Overlay::RankingsOverlay,
        Overlay::ScheduleOverlay,
        Overlay::TimerOverlay,
        Overlay::SponsorsOverlay,
        Overlay::Blank,
    ];

    /// Identifier used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Overlay::MatchOverlay => "matchOverlay",
            Overlay::RankingsOverlay => "rankingsOverlay",
            Overlay::ScheduleOverlay => "scheduleOverlay",
            Overlay::TimerOverlay => "timerOverlay",
            Overlay::SponsorsOverlay => "sponsorsOverlay",
            Overlay::Blank => "blank",
        }
    }

    fn kebab_str(&self) -> &'static str {
        match self {
            Overlay::MatchOverlay => "match-overlay",
            Overlay::RankingsOverlay => "rankings-overlay",
            Overlay::ScheduleOverlay => "schedule-overlay",
            Overlay::TimerOverlay => "timer-overlay",
            Overlay::SponsorsOverlay => "sponsors-overlay",
            Overlay::Blank => "blank",
        }
    }

    /// Resolve an overlay identifier, falling back to [`Overlay::MatchOverlay`] for unknown values.
    pub fn parse_or_default(value: &str) -> Self {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|overlay| overlay.as_str() == value || overlay.kebab_str() == value)
            .unwrap_or_default()
    }
}

/// Values every connected display must agree on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayState {
    /// Overlay shown on the audience display.
    pub overlay: Overlay,
    /// Selected region.
    pub region: String,
    /// Selected event.
    pub event_id: String,
    /// Human readable name of the selected event, when known.
    pub event_name: Option<String>,
    /// Whether a usable remote credential is held.
    pub authenticated: bool,
    /// Opaque identifier of the session currently being played.
    pub active_session: Option<String>,
}

impl DisplayState {
    /// Initial state restored from a persisted event selection.
    pub fn from_selection(selection: EventSelection, authenticated: bool) -> Self {
        Self {
            overlay: Overlay::default(),
            region: selection.region,
            event_id: selection.event_id,
            event_name: selection.event_name,
            authenticated,
            active_session: None,
        }
    }

    /// The subset of the state mirrored to the display config file.
    pub fn selection(&self) -> EventSelection {
        EventSelection {
            region: self.region.clone(),
            event_id: self.event_id.clone(),
            event_name: self.event_name.clone(),
        }
    }
}

impl Default for DisplayState {
    fn default() -> Self {
        Self::from_selection(EventSelection::default(), false)
    }
}

/// Names of the [`DisplayState`] fields, used to describe what a mutation changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateField {
    /// [`DisplayState::overlay`]
    Overlay,
    /// [`DisplayState::region`]
    Region,
    /// [`DisplayState::event_id`]
    EventId,
    /// [`DisplayState::event_name`]
    EventName,
    /// [`DisplayState::authenticated`]
    Authenticated,
    /// [`DisplayState::active_session`]
    ActiveSession,
}

impl StateField {
    /// Whether the field belongs to the persisted event selection.
    pub fn is_selection(&self) -> bool {
        matches!(
            self,
            StateField::Region | StateField::EventId | StateField::EventName
        )
    }
}

/// Partial update merged into the current [`DisplayState`].
///
/// `None` leaves a field untouched; `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatePatch {
    /// New overlay.
    pub overlay: Option<Overlay>,
    /// New region.
    pub region: Option<String>,
    /// New event.
    pub event_id: Option<String>,
    /// New event name.
    pub event_name: Option<Option<String>>,
    /// New auth flag.
    pub authenticated: Option<bool>,
    /// New active session.
    pub active_session: Option<Option<String>>,
}

impl StatePatch {
    /// Patch selecting the overlay named `name`; unknown names select the default overlay.
    pub fn overlay(name: &str) -> Self {
        Self {
            overlay: Some(Overlay::parse_or_default(name)),
            ..Self::default()
        }
    }

    /// Patch switching to another event in one step.
    pub fn event(region: String, event_id: String, event_name: Option<String>) -> Self {
        Self {
            region: Some(region),
            event_id: Some(event_id),
            event_name: Some(event_name),
            ..Self::default()
        }
    }

    /// Patch setting the auth flag.
    pub fn authenticated(value: bool) -> Self {
        Self {
            authenticated: Some(value),
            ..Self::default()
        }
    }

    /// Patch selecting, or clearing with `None`, the active session.
    pub fn active_session(session_id: Option<String>) -> Self {
        Self {
            active_session: Some(session_id),
            ..Self::default()
        }
    }
}

/// Notification fired after every [`DisplayStore::set`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    /// Full state after the mutation.
    pub snapshot: DisplayState,
    /// Fields whose value actually changed; empty for a no-op patch.
    pub changed: Vec<StateField>,
}

impl StateChange {
    /// Whether the mutation touched the persisted event selection.
    pub fn touches_selection(&self) -> bool {
        self.changed.iter().any(StateField::is_selection)
    }
}

/// Holder of the shared [`DisplayState`] with change notifications.
pub struct DisplayStore {
    state: RwLock<DisplayState>,
    changes: broadcast::Sender<StateChange>,
}

impl DisplayStore {
    /// Store starting out with `initial`.
    pub fn new(initial: DisplayState) -> Self {
        let (changes, _rx) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            state: RwLock::new(initial),
            changes,
        }
    }

    /// Copy of the current state.
    pub async fn get(&self) -> DisplayState {
        self.state.read().await.clone()
    }

    /// Merge `patch` into the current state and notify subscribers.
    ///
    /// The notification is sent while the write lock is held so subscribers
    /// observe changes in the order they were applied.
    pub async fn set(&self, patch: StatePatch) -> StateChange {
        let mut state = self.state.write().await;
        let mut changed = Vec::new();

        merge(&mut state.overlay, patch.overlay, StateField::Overlay, &mut changed);
        merge(&mut state.region, patch.region, StateField::Region, &mut changed);
        merge(&mut state.event_id, patch.event_id, StateField::EventId, &mut changed);
        merge(&mut state.event_name, patch.event_name, StateField::EventName, &mut changed);
        merge(
            &mut state.authenticated,
            patch.authenticated,
            StateField::Authenticated,
            &mut changed,
        );
        merge(
            &mut state.active_session,
            patch.active_session,
            StateField::ActiveSession,
            &mut changed,
        );

        let change = StateChange {
            snapshot: state.clone(),
            changed,
        };
        let _ = self.changes.send(change.clone());
        change
    }

    /// Subscribe to the changes applied from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }
}

fn merge<T: PartialEq>(
    slot: &mut T,
    value: Option<T>,
    field: StateField,
    changed: &mut Vec<StateField>,
) {
    if let Some(value) = value {
        if *slot != value {
            *slot = value;
            changed.push(field);
        }
    }
}
