//! Error types for the nbasim binary.

use nbasim_core::config::ConfigError;
use nbasim_core::PlaybackError;
use nbasim_feed::FeedError;
use nbasim_server::ServerError;

/// Top-level error for the nbasim binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that the command runners can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The play-by-play feed could not be retrieved.
    #[error("feed error: {source}")]
    Feed {
        /// The underlying feed error.
        #[from]
        source: FeedError,
    },

    /// The broadcast server failed to bind or serve.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: ServerError,
    },

    /// The producer connection to the broadcast server failed.
    #[error("cannot connect producer to {url}: {source}")]
    Connect {
        /// Target `WebSocket` URL.
        url: String,
        /// The underlying `WebSocket` error.
        source: Box<tokio_tungstenite::tungstenite::Error>,
    },

    /// Playback could not be started.
    #[error("playback error: {source}")]
    Playback {
        /// The underlying playback error.
        #[from]
        source: PlaybackError,
    },
}
