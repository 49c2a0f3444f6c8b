//! Server-side playback delivery.

use axum::extract::ws::Message;
use nbasim_core::{Event, EventSink, SessionId};
use tracing::{debug, warn};

use crate::hub::BroadcastHub;

/// [`EventSink`] that serializes each event and broadcasts it through the
/// local hub.
#[derive(Debug, Clone)]
pub struct HubSink {
    hub: BroadcastHub,
    session: SessionId,
}

impl HubSink {
    /// Create a sink delivering to `session`'s consumers.
    pub const fn new(hub: BroadcastHub, session: SessionId) -> Self {
        Self { hub, session }
    }
}

impl EventSink for HubSink {
    async fn deliver(&mut self, event: &Event) {
        let payload = match event.to_payload() {
            Ok(json) => json,
            Err(e) => {
                warn!(
                    session = %self.session,
                    offset = event.simulated_offset_seconds,
                    error = %e,
                    "failed to serialize event, skipping delivery"
                );
                return;
            }
        };
        let outcome = self
            .hub
            .broadcast(&self.session, Message::Text(payload.into()))
            .await;
        debug!(
            session = %self.session,
            action_type = %event.action_type,
            offset = event.simulated_offset_seconds,
            delivered = outcome.delivered,
            "event delivered"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use std::sync::Arc;

    use nbasim_feed::RawRecord;

    use super::*;
    use crate::connection::{Connection, Role};
    use crate::registry::ConnectionRegistry;

    #[tokio::test]
    async fn events_reach_consumers_as_json_text() {
        let registry = Arc::new(ConnectionRegistry::new());
        let session = SessionId::from("g");
        let (consumer, mut outbox) = Connection::new(Role::Consumer, 4);
        registry.register(&session, consumer).await;

        let mut sink = HubSink::new(BroadcastHub::new(registry), session);
        let event = Event::from_record(RawRecord::new("PT11M30.00S", 1, "2pt")).unwrap();
        sink.deliver(&event).await;

        let Message::Text(text) = outbox.recv().await.unwrap() else {
            panic!("expected a text frame");
        };
        let json: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(json["simulatedOffsetSeconds"], 30);
        assert_eq!(json["actionType"], "2pt");
    }
}
