//! Directory of open connections and their roles.

use std::collections::HashSet;

use dashmap::DashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::ws::OutboundEvent;

/// Identifier assigned to a connection when it is established.
pub type ConnectionId = Uuid;

/// Tag describing what kind of page sits behind a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Display attached to a competition table.
    TableDisplay,
    /// Projected display facing the audience.
    AudienceDisplay,
    /// Controller or a page that has not registered yet.
    Unassigned,
}

impl Role {
    /// Every role, in the order counts are reported.
    pub const ALL: [Role; 3] = [Role::TableDisplay, Role::AudienceDisplay, Role::Unassigned];
}

/// Number of registered connections per role. Every role is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct RoleCounts(IndexMap<Role, usize>);

impl RoleCounts {
    /// Number of connections registered under `role`.
    pub fn get(&self, role: Role) -> usize {
        self.0.get(&role).copied().unwrap_or_default()
    }
}

#[derive(Clone)]
/// Handle used to push messages to a connected client.
pub struct ConnectionHandle {
    /// Identifier of the connection.
    pub id: ConnectionId,
    /// Queue drained by the connection's writer task.
    pub tx: mpsc::UnboundedSender<OutboundEvent>,
}

/// Directory of connected clients and the role each one registered under.
pub struct SessionRegistry {
    connections: DashMap<ConnectionId, ConnectionHandle>,
    roles: RwLock<IndexMap<Role, HashSet<ConnectionId>>>,
}

impl SessionRegistry {
    /// Empty registry with every role present and unoccupied.
    pub fn new() -> Self {
        let roles = Role::ALL
            .into_iter()
            .map(|role| (role, HashSet::new()))
            .collect();
        Self {
            connections: DashMap::new(),
            roles: RwLock::new(roles),
        }
    }

    /// Track a freshly established connection. It holds no role yet.
    pub fn attach(&self, handle: ConnectionHandle) {
        self.connections.insert(handle.id, handle);
    }

    /// Forget a closed connection and any role it held.
    pub async fn detach(&self, id: ConnectionId) -> RoleCounts {
        self.connections.remove(&id);
        self.unregister(id).await
    }

    /// Register `id` under `role`, moving it out of any role it held before.
    ///
    /// Registering an id that is not connected leaves the registry untouched.
    pub async fn register(&self, id: ConnectionId, role: Role) -> RoleCounts {
        let mut roles = self.roles.write().await;
        if self.connections.contains_key(&id) {
            for (existing, members) in roles.iter_mut() {
                if *existing != role {
                    members.remove(&id);
                }
            }
            roles.entry(role).or_default().insert(id);
        }
        counts_of(&roles)
    }

    /// Remove `id` from every role set.
    pub async fn unregister(&self, id: ConnectionId) -> RoleCounts {
        let mut roles = self.roles.write().await;
        for members in roles.values_mut() {
            members.remove(&id);
        }
        counts_of(&roles)
    }

    /// Current number of connections per role.
    pub async fn counts_by_role(&self) -> RoleCounts {
        counts_of(&*self.roles.read().await)
    }

    /// Role currently held by `id`, if any.
    pub async fn role_of(&self, id: ConnectionId) -> Option<Role> {
        self.roles
            .read()
            .await
            .iter()
            .find(|(_, members)| members.contains(&id))
            .map(|(role, _)| *role)
    }

    /// Outbound queue of `id`, if it is still connected.
    pub fn sender(&self, id: ConnectionId) -> Option<mpsc::UnboundedSender<OutboundEvent>> {
        self.connections.get(&id).map(|entry| entry.tx.clone())
    }

    /// Snapshot of every open connection's sender.
    pub fn senders(&self) -> Vec<(ConnectionId, mpsc::UnboundedSender<OutboundEvent>)> {
        self.connections
            .iter()
            .map(|entry| (*entry.key(), entry.tx.clone()))
            .collect()
    }

    /// Number of open connections, registered or not.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn counts_of(roles: &IndexMap<Role, HashSet<ConnectionId>>) -> RoleCounts {
    RoleCounts(
        roles
            .iter()
            .map(|(role, members)| (*role, members.len()))
            .collect(),
    )
}
