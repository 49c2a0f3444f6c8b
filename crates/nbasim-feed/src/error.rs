//! Error types for feed retrieval.

/// Errors that can occur while retrieving a play-by-play feed.
///
/// Every variant is fatal to the playback run that requested the feed.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The HTTP request could not be sent or timed out.
    #[error("feed request failed for {url}: {source}")]
    Request {
        /// The URL that was requested.
        url: String,
        /// The underlying transport error.
        source: reqwest::Error,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build feed HTTP client: {0}")]
    Client(reqwest::Error),

    /// The feed answered with a non-success status code.
    #[error("feed returned HTTP {status} for {url}")]
    Status {
        /// The URL that was requested.
        url: String,
        /// The HTTP status code returned.
        status: u16,
    },

    /// The response body was not a valid play-by-play document.
    #[error("failed to decode feed response: {0}")]
    Decode(#[from] serde_json::Error),

    /// No records are known for the requested game.
    #[error("no feed available for game {0}")]
    UnknownGame(String),
}
