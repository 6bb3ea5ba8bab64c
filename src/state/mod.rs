//! Process-wide state shared by every connection.

pub mod display;
pub mod registry;

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{
    dao::{access::DataAccess, credential_store::CredentialStore, selection_store::SelectionStore},
    dto::ws::OutboundEvent,
};

use self::{
    display::{DisplayState, DisplayStore},
    registry::{ConnectionId, SessionRegistry},
};

/// Handle to the [`AppState`] shared by routes and tasks.
pub type SharedState = Arc<AppState>;

/// Process-wide singletons shared by every connection.
pub struct AppState {
    registry: SessionRegistry,
    display: DisplayStore,
    access: Arc<dyn DataAccess>,
    credentials: Arc<dyn CredentialStore>,
    selection: Arc<dyn SelectionStore>,
    broadcast_gate: Mutex<()>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(
        access: Arc<dyn DataAccess>,
        credentials: Arc<dyn CredentialStore>,
        selection: Arc<dyn SelectionStore>,
        initial: DisplayState,
    ) -> SharedState {
        Arc::new(Self {
            registry: SessionRegistry::new(),
            display: DisplayStore::new(initial),
            access,
            credentials,
            selection,
            broadcast_gate: Mutex::new(()),
        })
    }

    /// Registry of open connections and their roles.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Shared overlay / event / session / auth values.
    pub fn display(&self) -> &DisplayStore {
        &self.display
    }

    /// Remote database and identity provider access.
    pub fn access(&self) -> &Arc<dyn DataAccess> {
        &self.access
    }

    /// Persisted refresh token.
    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    /// Persisted event selection.
    pub fn selection_store(&self) -> &Arc<dyn SelectionStore> {
        &self.selection
    }

    /// Gate serializing state mutations with the messages announcing them.
    ///
    /// Held while a mutation is applied and broadcast, and while a new
    /// connection receives its initial snapshot.
    pub async fn hold_broadcasts(&self) -> MutexGuard<'_, ()> {
        self.broadcast_gate.lock().await
    }

    /// Queue `event` for the connection `id`.
    pub fn emit_to(&self, id: ConnectionId, event: OutboundEvent) {
        match self.registry.sender(id) {
            Some(tx) => {
                if tx.send(event).is_err() {
                    warn!(id = %id, "failed to deliver message: connection writer closed");
                }
            }
            None => debug!(id = %id, event = %event.event, "dropping message for closed connection"),
        }
    }

    /// Queue `event` for every open connection.
    pub fn emit_to_all(&self, event: OutboundEvent) {
        for (id, tx) in self.registry.senders() {
            if tx.send(event.clone()).is_err() {
                warn!(id = %id, "failed to deliver broadcast: connection writer closed");
            }
        }
    }
}
