//! Client-side producer connection.
//!
//! [`ProducerLink`] opens a `WebSocket` to the broadcast server as the
//! producer of one session and forwards each event the scheduler hands it
//! as a JSON text frame. Send failures are logged and dropped; the
//! timeline keeps going.

use futures::SinkExt;
use nbasim_core::{Event, EventSink, SessionId};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::CliError;

/// Producer endpoint of `session` on the server at `base_url`.
pub fn producer_url(base_url: &str, session: &SessionId) -> String {
    format!(
        "{}/ws/game/{session}?type=producer",
        base_url.trim_end_matches('/')
    )
}

/// Producer-role `WebSocket` to the broadcast server.
pub struct ProducerLink {
    session: SessionId,
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    failures: usize,
}

impl ProducerLink {
    /// Connect to the server at `base_url` as the producer of `session`.
    pub async fn connect(base_url: &str, session: SessionId) -> Result<Self, CliError> {
        let url = producer_url(base_url, &session);
        let (socket, _) = connect_async(url.as_str())
            .await
            .map_err(|e| CliError::Connect {
                url: url.clone(),
                source: Box::new(e),
            })?;
        info!(%session, %url, "producer connected");
        Ok(Self {
            session,
            socket,
            failures: 0,
        })
    }

    /// Number of events that could not be sent.
    pub const fn failures(&self) -> usize {
        self.failures
    }

    /// Close the connection.
    pub async fn close(mut self) {
        if let Err(e) = self.socket.close(None).await {
            debug!(session = %self.session, error = %e, "producer close failed");
        }
        info!(session = %self.session, "producer disconnected");
    }
}

impl EventSink for ProducerLink {
    async fn deliver(&mut self, event: &Event) {
        let payload = match event.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(session = %self.session, error = %e, "failed to serialize event");
                self.failures = self.failures.saturating_add(1);
                return;
            }
        };
        if let Err(e) = self.socket.send(Message::Text(payload.into())).await {
            warn!(
                session = %self.session,
                offset = event.simulated_offset_seconds,
                error = %e,
                "failed to send event"
            );
            self.failures = self.failures.saturating_add(1);
        }
    }
}
