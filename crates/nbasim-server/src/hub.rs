//! Broadcast fan-out to a session's consumers.
//!
//! [`BroadcastHub::broadcast`] is best-effort and always completes. Every
//! consumer registered when the call starts either gets the frame queued
//! exactly once or is treated as gone: unregistered, closed, and logged.
//! Failures are never returned to the caller.

use std::sync::Arc;

use axum::extract::ws::Message;
use nbasim_core::SessionId;
use serde::Serialize;
use tracing::{debug, warn};

use crate::connection::Role;
use crate::registry::ConnectionRegistry;

/// Result of one broadcast call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastOutcome {
    /// Consumers the frame was queued for.
    pub delivered: usize,
    /// Consumers removed because the send failed.
    pub pruned: usize,
}

/// Fans frames out to the consumers of a session.
#[derive(Debug, Clone)]
pub struct BroadcastHub {
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastHub {
    /// Create a hub over a shared registry.
    pub const fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this hub prunes from.
    pub const fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Send `payload` to every consumer currently registered for `session`.
    pub async fn broadcast(&self, session: &SessionId, payload: Message) -> BroadcastOutcome {
        let consumers = self.registry.snapshot(session, Role::Consumer).await;
        let mut outcome = BroadcastOutcome::default();

        for connection in consumers {
            match connection.try_send(payload.clone()) {
                Ok(()) => outcome.delivered = outcome.delivered.saturating_add(1),
                Err(e) => {
                    warn!(
                        %session,
                        connection = %connection.id(),
                        error = %e,
                        "failed to broadcast to consumer, dropping it"
                    );
                    self.registry.unregister(session, connection.id()).await;
                    connection.close();
                    outcome.pruned = outcome.pruned.saturating_add(1);
                }
            }
        }

        debug!(
            %session,
            delivered = outcome.delivered,
            pruned = outcome.pruned,
            "broadcast complete"
        );
        outcome
    }
}
