//! Session-scoped connection registry.
//!
//! Each session owns two disjoint sets of live connections, producers and
//! consumers. One lock guards the whole map: registration, removal, and
//! snapshots are mutually exclusive and never touch the network.
//!
//! A session's partition is created by its first registration and removed
//! as soon as its last connection leaves.

use std::collections::{BTreeMap, HashMap};

use nbasim_core::SessionId;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::connection::{Connection, ConnectionId, Role};

#[derive(Debug, Default)]
struct SessionPartition {
    producers: HashMap<ConnectionId, Connection>,
    consumers: HashMap<ConnectionId, Connection>,
}

impl SessionPartition {
    const fn set_mut(&mut self, role: Role) -> &mut HashMap<ConnectionId, Connection> {
        match role {
            Role::Producer => &mut self.producers,
            Role::Consumer => &mut self.consumers,
        }
    }

    const fn set(&self, role: Role) -> &HashMap<ConnectionId, Connection> {
        match role {
            Role::Producer => &self.producers,
            Role::Consumer => &self.consumers,
        }
    }

    fn is_empty(&self) -> bool {
        self.producers.is_empty() && self.consumers.is_empty()
    }
}

/// Connection counts for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Registered producer connections.
    pub producers: usize,
    /// Registered consumer connections.
    pub consumers: usize,
}

/// Point-in-time summary of the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Per-session counts, ordered by session id.
    pub sessions: BTreeMap<SessionId, SessionStats>,
}

impl RegistryStats {
    /// Number of sessions with at least one connection.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Total producer connections across sessions.
    pub fn producer_connections(&self) -> usize {
        self.sessions
            .values()
            .fold(0, |acc, s| acc.saturating_add(s.producers))
    }

    /// Total consumer connections across sessions.
    pub fn consumer_connections(&self) -> usize {
        self.sessions
            .values()
            .fold(0, |acc, s| acc.saturating_add(s.consumers))
    }

    /// Total connections of either role.
    pub fn total_connections(&self) -> usize {
        self.producer_connections()
            .saturating_add(self.consumer_connections())
    }

    /// Sessions with at least one producer connection.
    pub fn producer_sessions(&self) -> impl Iterator<Item = &SessionId> {
        self.sessions
            .iter()
            .filter(|(_, s)| s.producers > 0)
            .map(|(id, _)| id)
    }
}

/// Registry of live connections, partitioned by session and role.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: Mutex<HashMap<SessionId, SessionPartition>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to its role's set for `session`.
    ///
    /// Idempotent: registering the same connection twice keeps one entry.
    pub async fn register(&self, session: &SessionId, connection: Connection) {
        let id = connection.id();
        let role = connection.role();
        let mut sessions = self.sessions.lock().await;
        let partition = sessions.entry(session.clone()).or_default();
        partition.set_mut(role).insert(id, connection);
        debug!(%session, connection = %id, %role, "connection registered");
    }

    /// Remove a connection from `session`, whichever role it holds.
    ///
    /// Returns the removed handle, or `None` if it was not registered.
    /// Empty sessions are dropped.
    pub async fn unregister(&self, session: &SessionId, id: ConnectionId) -> Option<Connection> {
        let mut sessions = self.sessions.lock().await;
        let partition = sessions.get_mut(session)?;
        let removed = partition
            .producers
            .remove(&id)
            .or_else(|| partition.consumers.remove(&id));
        if partition.is_empty() {
            sessions.remove(session);
            debug!(%session, "session emptied");
        }
        if removed.is_some() {
            debug!(%session, connection = %id, "connection unregistered");
        }
        removed
    }

    /// Copy of the connections currently registered for `session` in `role`.
    pub async fn snapshot(&self, session: &SessionId, role: Role) -> Vec<Connection> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(session)
            .map(|partition| partition.set(role).values().cloned().collect())
            .unwrap_or_default()
    }

    /// Connection counts per session.
    pub async fn stats(&self) -> RegistryStats {
        let sessions = self.sessions.lock().await;
        let sessions = sessions
            .iter()
            .map(|(id, partition)| {
                (
                    id.clone(),
                    SessionStats {
                        producers: partition.producers.len(),
                        consumers: partition.consumers.len(),
                    },
                )
            })
            .collect();
        RegistryStats { sessions }
    }
}
