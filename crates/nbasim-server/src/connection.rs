//! Connection handles held by the registry.
//!
//! The transport owns the socket. What the registry keeps is a cheap,
//! cloneable [`Connection`]: an id, a role, the sending half of the
//! connection's bounded outbox, and a close signal. The socket's writer
//! task drains the matching [`Outbox`].

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use uuid::Uuid;

/// Role a connection plays within its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Feeds events into the session's broadcast.
    Producer,
    /// Receives the session's broadcast.
    Consumer,
}

/// A role tag that is neither `producer` nor `consumer`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown connection type: {0:?}")]
pub struct UnknownRole(pub String);

impl Role {
    /// Parse the `type` query parameter.
    ///
    /// A missing or empty tag means [`Role::Consumer`]. The legacy tags
    /// `simulator` and `listener` are accepted as aliases.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownRole`] for any other tag.
    pub fn parse(tag: Option<&str>) -> Result<Self, UnknownRole> {
        match tag.unwrap_or_default() {
            "producer" | "simulator" => Ok(Self::Producer),
            "" | "consumer" | "listener" => Ok(Self::Consumer),
            other => Err(UnknownRole(other.to_owned())),
        }
    }

    /// Lowercase name, as used on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Producer => "producer",
            Self::Consumer => "consumer",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique identifier of a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a frame could not be handed to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The connection's writer has stopped (peer gone or closed).
    #[error("connection closed")]
    Closed,
    /// The outbox is full; the peer is not keeping up.
    #[error("connection outbox full")]
    Full,
}

/// Registry-side handle to a live connection.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    role: Role,
    tx: mpsc::Sender<Message>,
    closed: CancellationToken,
}

impl Connection {
    /// Create a handle and the outbox its writer task will drain.
    ///
    /// `capacity` is the number of frames buffered before sends start
    /// failing with [`SendError::Full`]; it is raised to at least 1.
    pub fn new(role: Role, capacity: usize) -> (Self, Outbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let closed = CancellationToken::new();
        let connection = Self {
            id: ConnectionId::new(),
            role,
            tx,
            closed: closed.clone(),
        };
        (connection, Outbox { rx, closed })
    }

    /// The connection's identifier.
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// The connection's role.
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Enqueue a frame without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Closed`] if the connection is closed or its
    /// writer has gone, and [`SendError::Full`] if the outbox is full.
    pub fn try_send(&self, message: Message) -> Result<(), SendError> {
        if self.closed.is_cancelled() {
            return Err(SendError::Closed);
        }
        self.tx.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::Closed,
        })
    }

    /// Signal the transport to close the underlying socket.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Whether the connection has been closed or its writer has gone.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.tx.is_closed()
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }
}

/// Receiving half of a connection's outbox, owned by its writer task.
#[derive(Debug)]
pub struct Outbox {
    rx: mpsc::Receiver<Message>,
    closed: CancellationToken,
}

impl Outbox {
    /// Next frame to write, or `None` once the connection is closed.
    pub async fn recv(&mut self) -> Option<Message> {
        tokio::select! {
            () = self.closed.cancelled() => None,
            message = self.rx.recv() => message,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing() {
        assert_eq!(Role::parse(None).unwrap(), Role::Consumer);
        assert_eq!(Role::parse(Some("")).unwrap(), Role::Consumer);
        assert_eq!(Role::parse(Some("consumer")).unwrap(), Role::Consumer);
        assert_eq!(Role::parse(Some("listener")).unwrap(), Role::Consumer);
        assert_eq!(Role::parse(Some("producer")).unwrap(), Role::Producer);
        assert_eq!(Role::parse(Some("simulator")).unwrap(), Role::Producer);
        assert_eq!(
            Role::parse(Some("spectator")).unwrap_err(),
            UnknownRole("spectator".to_owned())
        );
    }

    #[tokio::test]
    async fn frames_flow_through_outbox() {
        let (connection, mut outbox) = Connection::new(Role::Consumer, 4);
        connection.try_send(Message::Text("hello".into())).unwrap();
        let received = outbox.recv().await.unwrap();
        assert_eq!(received, Message::Text("hello".into()));
    }

    #[test]
    fn full_outbox_reports_full() {
        let (connection, _outbox) = Connection::new(Role::Consumer, 1);
        connection.try_send(Message::Text("a".into())).unwrap();
        assert_eq!(
            connection.try_send(Message::Text("b".into())),
            Err(SendError::Full)
        );
    }

    #[test]
    fn dropped_outbox_reports_closed() {
        let (connection, outbox) = Connection::new(Role::Consumer, 4);
        drop(outbox);
        assert!(connection.is_closed());
        assert_eq!(
            connection.try_send(Message::Text("a".into())),
            Err(SendError::Closed)
        );
    }

    #[tokio::test]
    async fn close_ends_outbox() {
        let (connection, mut outbox) = Connection::new(Role::Producer, 4);
        connection.close();
        assert!(connection.is_closed());
        assert!(outbox.recv().await.is_none());
        assert_eq!(
            connection.try_send(Message::Text("a".into())),
            Err(SendError::Closed)
        );
    }
}
