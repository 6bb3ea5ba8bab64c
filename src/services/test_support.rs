use std::{
    future::ready,
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use futures::future::BoxFuture;
use serde_json::{Value, json};
use tokio::{sync::mpsc, task::JoinHandle};
use uuid::Uuid;

use crate::{
    dao::{
        access::{AccessError, AccessResult, DataAccess},
        credential_store::CredentialStore,
        models::{EventSelection, TeamScoreSummary, UserInfo, summarize_teams},
        selection_store::SelectionStore,
        storage::{StorageError, StorageResult},
    },
    dto::ws::OutboundEvent,
    services::{coordinator, persistence},
    state::{
        AppState, SharedState,
        display::DisplayState,
        registry::{ConnectionHandle, ConnectionId},
    },
};

const WAIT_STEP: Duration = Duration::from_millis(10);
const WAIT_STEPS: usize = 200;

/// In-memory refresh token store.
#[derive(Default)]
pub(crate) struct MemoryCredentialStore {
    token: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub(crate) fn seed(&self, token: &str) {
        *self.token.lock().expect("token mutex poisoned") = Some(token.to_string());
    }

    pub(crate) fn token(&self) -> Option<String> {
        self.token.lock().expect("token mutex poisoned").clone()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> BoxFuture<'static, StorageResult<Option<String>>> {
        Box::pin(ready(Ok(self.token())))
    }

    fn save(&self, refresh_token: String) -> BoxFuture<'static, StorageResult<()>> {
        *self.token.lock().expect("token mutex poisoned") = Some(refresh_token);
        Box::pin(ready(Ok(())))
    }

    fn delete(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.token.lock().expect("token mutex poisoned").take();
        Box::pin(ready(Ok(())))
    }
}

/// Selection store recording every successful save.
#[derive(Default)]
pub(crate) struct MemorySelectionStore {
    saved: Mutex<Vec<EventSelection>>,
    attempts: AtomicUsize,
    fail: AtomicBool,
}

impl MemorySelectionStore {
    pub(crate) fn saved(&self) -> Vec<EventSelection> {
        self.saved.lock().expect("selection mutex poisoned").clone()
    }

    pub(crate) fn fail_saves(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Wait until at least `count` saves succeeded and return them.
    pub(crate) async fn wait_for_saves(&self, count: usize) -> Vec<EventSelection> {
        for _ in 0..WAIT_STEPS {
            if self.saved().len() >= count {
                break;
            }
            tokio::time::sleep(WAIT_STEP).await;
        }
        self.saved()
    }

    /// Wait until at least `count` saves were attempted.
    pub(crate) async fn wait_for_attempts(&self, count: usize) {
        for _ in 0..WAIT_STEPS {
            if self.attempts.load(Ordering::SeqCst) >= count {
                return;
            }
            tokio::time::sleep(WAIT_STEP).await;
        }
    }
}

impl SelectionStore for MemorySelectionStore {
    fn load(&self) -> BoxFuture<'static, StorageResult<EventSelection>> {
        let latest = self.saved().pop().unwrap_or_default();
        Box::pin(ready(Ok(latest)))
    }

    fn save(&self, selection: EventSelection) -> BoxFuture<'static, StorageResult<()>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let result = if self.fail.load(Ordering::SeqCst) {
            Err(StorageError::write(
                Path::new("memory/display.json"),
                std::io::Error::other("disk full"),
            ))
        } else {
            self.saved
                .lock()
                .expect("selection mutex poisoned")
                .push(selection);
            Ok(())
        };
        Box::pin(ready(result))
    }
}

/// Scripted [`DataAccess`] double that records the calls it receives.
///
/// A credential is "reloaded" from the shared [`MemoryCredentialStore`] the
/// same way the real client reloads it from disk.
pub(crate) struct FakeAccess {
    credentials: Arc<MemoryCredentialStore>,
    signed_in: AtomicBool,
    can_reload: AtomicBool,
    calls: Mutex<Vec<String>>,
    failure: Mutex<Option<AccessError>>,
    events: Mutex<Value>,
    teams: Mutex<Value>,
    sessions: Mutex<Value>,
    matches: Mutex<Value>,
    regions: Mutex<Vec<String>>,
}

impl FakeAccess {
    pub(crate) fn new(credentials: Arc<MemoryCredentialStore>) -> Self {
        Self {
            credentials,
            signed_in: AtomicBool::new(false),
            can_reload: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            events: Mutex::new(json!({})),
            teams: Mutex::new(json!({})),
            sessions: Mutex::new(json!({})),
            matches: Mutex::new(json!({})),
            regions: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }

    /// Allow or forbid silent reloads; forbidding also drops the in-memory credential.
    pub(crate) fn set_can_reload(&self, allowed: bool) {
        self.can_reload.store(allowed, Ordering::SeqCst);
        if !allowed {
            self.signed_in.store(false, Ordering::SeqCst);
        }
    }

    pub(crate) fn fail_with(&self, err: AccessError) {
        *self.failure.lock().expect("failure mutex poisoned") = Some(err);
    }

    pub(crate) fn set_events(&self, events: Value) {
        *self.events.lock().expect("events mutex poisoned") = events;
    }

    pub(crate) fn set_teams(&self, teams: Value) {
        *self.teams.lock().expect("teams mutex poisoned") = teams;
    }

    pub(crate) fn set_sessions(&self, sessions: Value) {
        *self.sessions.lock().expect("sessions mutex poisoned") = sessions;
    }

    pub(crate) fn set_matches(&self, matches: Value) {
        *self.matches.lock().expect("matches mutex poisoned") = matches;
    }

    pub(crate) fn set_regions(&self, regions: Vec<String>) {
        *self.regions.lock().expect("regions mutex poisoned") = regions;
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls mutex poisoned").push(call);
    }

    /// Make sure a credential is held, reloading it once from the store when missing.
    fn ensure_credential(&self) -> AccessResult<()> {
        if self.signed_in.load(Ordering::SeqCst) {
            return Ok(());
        }
        if self.can_reload.load(Ordering::SeqCst) && self.credentials.token().is_some() {
            self.record("reload".to_string());
            self.signed_in.store(true, Ordering::SeqCst);
            return Ok(());
        }
        Err(AccessError::Unauthenticated(
            "no refresh token available".to_string(),
        ))
    }

    fn read<T>(&self, call: String, value: impl FnOnce() -> T) -> BoxFuture<'static, AccessResult<T>>
    where
        T: Send + 'static,
    {
        let result = self.ensure_credential().and_then(|()| {
            self.record(call);
            match self.failure.lock().expect("failure mutex poisoned").clone() {
                Some(err) => Err(err),
                None => Ok(value()),
            }
        });
        Box::pin(ready(result))
    }
}

impl DataAccess for FakeAccess {
    fn region_events(&self, region: String) -> BoxFuture<'static, AccessResult<Value>> {
        self.read(format!("region_events:{region}"), || {
            self.events.lock().expect("events mutex poisoned").clone()
        })
    }

    fn list_regions(&self) -> BoxFuture<'static, AccessResult<Vec<String>>> {
        self.read("list_regions".to_string(), || {
            self.regions.lock().expect("regions mutex poisoned").clone()
        })
    }

    fn team_scores_summary(
        &self,
        region: String,
        event_id: String,
    ) -> BoxFuture<'static, AccessResult<Vec<TeamScoreSummary>>> {
        self.read(format!("team_scores_summary:{region}/{event_id}"), || {
            summarize_teams(&self.teams.lock().expect("teams mutex poisoned"))
        })
    }

    fn event_sessions(
        &self,
        region: String,
        event_id: String,
    ) -> BoxFuture<'static, AccessResult<Value>> {
        self.read(format!("event_sessions:{region}/{event_id}"), || {
            self.sessions.lock().expect("sessions mutex poisoned").clone()
        })
    }

    fn session_matches(
        &self,
        region: String,
        event_id: String,
        session_id: String,
    ) -> BoxFuture<'static, AccessResult<Value>> {
        self.read(
            format!("session_matches:{region}/{event_id}/{session_id}"),
            || self.matches.lock().expect("matches mutex poisoned").clone(),
        )
    }

    fn request_login_challenge(&self, email: String) -> BoxFuture<'static, AccessResult<()>> {
        self.record(format!("request_login_challenge:{email}"));
        let result = match self.failure.lock().expect("failure mutex poisoned").clone() {
            Some(err) => Err(err),
            None => Ok(()),
        };
        Box::pin(ready(result))
    }

    fn complete_login(
        &self,
        email: String,
        magic_link: String,
    ) -> BoxFuture<'static, AccessResult<String>> {
        self.record(format!("complete_login:{email}"));
        let result = if magic_link.contains("oobCode=") {
            self.signed_in.store(true, Ordering::SeqCst);
            Ok("refresh-token".to_string())
        } else {
            Err(AccessError::Rejected("magic link has no oobCode".to_string()))
        };
        Box::pin(ready(result))
    }

    fn user_info(&self) -> BoxFuture<'static, AccessResult<UserInfo>> {
        self.read("lookup_user".to_string(), || UserInfo {
            user_id: Some("uid-1".to_string()),
            email: Some("ops@example.org".to_string()),
        })
    }

    fn reload_credential(&self) -> BoxFuture<'static, AccessResult<()>> {
        self.signed_in.store(false, Ordering::SeqCst);
        Box::pin(ready(self.ensure_credential()))
    }

    fn sign_out(&self) -> BoxFuture<'static, ()> {
        self.record("sign_out".to_string());
        self.signed_in.store(false, Ordering::SeqCst);
        Box::pin(ready(()))
    }
}

/// Application state wired to in-memory doubles, plus helpers driving the coordinator.
pub(crate) struct TestHarness {
    pub(crate) state: SharedState,
    pub(crate) access: Arc<FakeAccess>,
    pub(crate) credentials: Arc<MemoryCredentialStore>,
    pub(crate) selection: Arc<MemorySelectionStore>,
}

impl TestHarness {
    /// Fresh state with a persisted refresh token available for silent reload.
    pub(crate) fn new() -> Self {
        let credentials = Arc::new(MemoryCredentialStore::default());
        credentials.seed("stored-refresh-token");
        let access = Arc::new(FakeAccess::new(credentials.clone()));
        let selection = Arc::new(MemorySelectionStore::default());
        let state = AppState::new(
            access.clone(),
            credentials.clone(),
            selection.clone(),
            DisplayState::default(),
        );
        Self {
            state,
            access,
            credentials,
            selection,
        }
    }

    pub(crate) async fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<OutboundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        coordinator::on_connect(&self.state, ConnectionHandle { id, tx }).await;
        (id, rx)
    }

    pub(crate) async fn disconnect(&self, id: ConnectionId) {
        coordinator::on_disconnect(&self.state, id).await;
    }

    pub(crate) async fn send(&self, id: ConnectionId, text: &str) {
        coordinator::on_message(&self.state, id, text).await;
    }

    pub(crate) fn spawn_persistence(&self) -> JoinHandle<()> {
        persistence::spawn(self.state.clone())
    }
}

/// Everything queued for a connection so far.
pub(crate) fn drain(rx: &mut mpsc::UnboundedReceiver<OutboundEvent>) -> Vec<OutboundEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
