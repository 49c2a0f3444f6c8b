//! Broadcast server for nbasim.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws/game/{session}?type=producer|consumer`)
//!   where consumers subscribe to a session and producers feed it
//! - **Status endpoint** (`GET /api/status`) summarising sessions and
//!   connections
//! - **Playback endpoints** (`POST`/`DELETE /api/sessions/{session}/playback`)
//!   that drive server-side playback straight into the hub
//!
//! # Architecture
//!
//! ```text
//! producer frame ----\
//!                     >--> BroadcastHub --> ConnectionRegistry snapshot --> consumer outboxes
//! PlaybackScheduler --/        (HubSink)
//! ```
//!
//! The [`ConnectionRegistry`] is the only shared mutable structure. A
//! broadcast copies the consumer set under the lock and then enqueues the
//! frame on each consumer's bounded outbox; the network writes happen on
//! per-connection writer tasks, so the lock is never held across I/O.
//!
//! [`ConnectionRegistry`]: registry::ConnectionRegistry

pub mod connection;
pub mod error;
pub mod handlers;
pub mod hub;
pub mod playback;
pub mod registry;
pub mod router;
pub mod server;
pub mod sink;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use connection::{Connection, ConnectionId, Outbox, Role};
pub use hub::{BroadcastHub, BroadcastOutcome};
pub use registry::{ConnectionRegistry, RegistryStats, SessionStats};
pub use router::build_router;
pub use server::{serve, start_server, ServerConfig, ServerError};
pub use sink::HubSink;
pub use state::AppState;
