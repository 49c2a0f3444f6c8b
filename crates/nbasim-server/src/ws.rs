//! `WebSocket` endpoint for session producers and consumers.
//!
//! Clients connect to `GET /ws/game/{session}?type=producer|consumer`.
//! A missing `type` means consumer. An unrecognised `type` is answered
//! with a close frame and the connection is never registered.
//!
//! Each accepted socket is split in two. A writer task drains the
//! connection's [`Outbox`](crate::connection::Outbox) into the socket;
//! the handler itself reads inbound frames. Frames from a producer are
//! relayed to the session's consumers; frames from a consumer are
//! ignored. Either side ending tears down the other, and the connection
//! is removed from the registry exactly once.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use nbasim_core::SessionId;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::connection::{Connection, Role};
use crate::state::AppState;

/// Close code sent when the `type` parameter is not understood.
const CLOSE_POLICY_VIOLATION: u16 = 1008;

/// Query parameters accepted on connect.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectQuery {
    /// Connection role tag.
    #[serde(rename = "type")]
    pub role: Option<String>,
}

/// Upgrade an HTTP request to a session `WebSocket`.
///
/// # Route
///
/// `GET /ws/game/{session}`
pub async fn ws_game(
    ws: WebSocketUpgrade,
    Path(session): Path<String>,
    Query(query): Query<ConnectQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let session = SessionId::from(session);
    ws.on_upgrade(move |socket| handle_ws(socket, session, query, state))
}

async fn handle_ws(
    mut socket: WebSocket,
    session: SessionId,
    query: ConnectQuery,
    state: Arc<AppState>,
) {
    let role = match Role::parse(query.role.as_deref()) {
        Ok(role) => role,
        Err(e) => {
            warn!(%session, error = %e, "rejecting connection");
            let frame = CloseFrame {
                code: CLOSE_POLICY_VIOLATION,
                reason: e.to_string().into(),
            };
            if let Err(e) = socket.send(Message::Close(Some(frame))).await {
                debug!(%session, error = %e, "close frame not delivered");
            }
            return;
        }
    };

    let (connection, mut outbox) = Connection::new(role, state.queue_capacity);
    let id = connection.id();
    state.registry.register(&session, connection.clone()).await;
    info!(%session, connection = %id, %role, "client connected");

    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(message) = outbox.recv().await {
            if let Err(e) = sink.send(message).await {
                debug!(connection = %id, error = %e, "write failed");
                return;
            }
        }
        if let Err(e) = sink.send(Message::Close(None)).await {
            debug!(connection = %id, error = %e, "close frame not delivered");
        }
    });

    loop {
        let frame = tokio::select! {
            () = connection.closed() => break,
            frame = stream.next() => frame,
        };
        match frame {
            None | Some(Ok(Message::Close(_))) => break,
            Some(Ok(message @ (Message::Text(_) | Message::Binary(_)))) => {
                if role == Role::Producer {
                    let outcome = state.hub.broadcast(&session, message).await;
                    debug!(
                        %session,
                        delivered = outcome.delivered,
                        pruned = outcome.pruned,
                        "producer frame relayed"
                    );
                }
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                debug!(%session, connection = %id, error = %e, "read failed");
                break;
            }
        }
    }

    state.registry.unregister(&session, id).await;
    connection.close();
    if let Err(e) = writer.await {
        warn!(connection = %id, error = %e, "writer task failed");
    }
    info!(%session, connection = %id, %role, "client disconnected");
}
