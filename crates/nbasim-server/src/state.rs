//! Shared application state for the broadcast server.

use std::sync::Arc;

use nbasim_core::config::{NbasimConfig, PlaybackConfig};
use nbasim_feed::Feed;

use crate::hub::BroadcastHub;
use crate::playback::PlaybackManager;
use crate::registry::ConnectionRegistry;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug)]
pub struct AppState {
    /// Live connections per session and role.
    pub registry: Arc<ConnectionRegistry>,
    /// Fan-out over `registry`.
    pub hub: BroadcastHub,
    /// Active server-side playback runs.
    pub playbacks: Arc<PlaybackManager>,
    /// Source of raw records for server-side playback.
    pub feed: Feed,
    /// Outbound frames buffered per connection.
    pub queue_capacity: usize,
    /// Defaults for server-side playback requests.
    pub playback_defaults: PlaybackConfig,
}

impl AppState {
    /// Create state with default settings.
    pub fn new(feed: Feed) -> Self {
        Self::with_config(feed, &NbasimConfig::default())
    }

    /// Create state from loaded configuration.
    pub fn with_config(feed: Feed, config: &NbasimConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        Self {
            hub: BroadcastHub::new(Arc::clone(&registry)),
            registry,
            playbacks: Arc::new(PlaybackManager::new()),
            feed,
            queue_capacity: config.server.consumer_queue_capacity,
            playback_defaults: config.playback.clone(),
        }
    }
}
