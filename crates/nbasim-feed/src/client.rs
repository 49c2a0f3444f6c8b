//! Feed sources.
//!
//! Uses enum dispatch ([`Feed`]) rather than a trait object so the async
//! fetch stays dyn-free.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::FeedError;
use crate::record::{PlayByPlayResponse, RawRecord};

/// Default public play-by-play URL. `{game_id}` is substituted per request.
pub const DEFAULT_URL_TEMPLATE: &str =
    "https://cdn.nba.com/static/json/liveData/playbyplay/playbyplay_{game_id}.json";

/// Placeholder replaced with the game id in a URL template.
const GAME_ID_PLACEHOLDER: &str = "{game_id}";

/// A source of raw action records, keyed by game id.
#[derive(Debug, Clone)]
pub enum Feed {
    /// Records fetched over HTTP.
    Http(FeedClient),
    /// Records held in memory.
    Fixed(FixedFeed),
}

impl Feed {
    /// Retrieve the records for a game, in feed order.
    ///
    /// # Errors
    ///
    /// Returns a [`FeedError`] on network, status, or decode failure, or
    /// when a fixed feed has no records for `game_id`.
    pub async fn fetch_records(&self, game_id: &str) -> Result<Vec<RawRecord>, FeedError> {
        match self {
            Self::Http(client) => client.fetch_records(game_id).await,
            Self::Fixed(fixed) => fixed.records(game_id),
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::Fixed(_) => "fixed",
        }
    }
}

impl From<FeedClient> for Feed {
    fn from(client: FeedClient) -> Self {
        Self::Http(client)
    }
}

impl From<FixedFeed> for Feed {
    fn from(fixed: FixedFeed) -> Self {
        Self::Fixed(fixed)
    }
}

/// HTTP client for the play-by-play feed.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: reqwest::Client,
    url_template: String,
}

impl FeedClient {
    /// Create a client for the given URL template and request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Client`] if the underlying HTTP client cannot
    /// be built (e.g. TLS backend initialisation failure).
    pub fn new(url_template: impl Into<String>, timeout: Duration) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FeedError::Client)?;
        Ok(Self {
            client,
            url_template: url_template.into(),
        })
    }

    /// Resolve the URL for a game id.
    pub fn url_for(&self, game_id: &str) -> String {
        self.url_template.replace(GAME_ID_PLACEHOLDER, game_id)
    }

    /// Fetch and decode the full play-by-play document for a game.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Request`] on transport failure or timeout,
    /// [`FeedError::Status`] on a non-2xx answer, and
    /// [`FeedError::Decode`] if the body is not a play-by-play document.
    pub async fn fetch_response(&self, game_id: &str) -> Result<PlayByPlayResponse, FeedError> {
        let url = self.url_for(game_id);
        info!(%url, "fetching play-by-play feed");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| FeedError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| FeedError::Request {
                url: url.clone(),
                source,
            })?;
        debug!(%url, bytes = body.len(), "feed body received");

        Ok(serde_json::from_slice(&body)?)
    }

    /// Fetch only the action records for a game, in feed order.
    ///
    /// # Errors
    ///
    /// See [`FeedClient::fetch_response`].
    pub async fn fetch_records(&self, game_id: &str) -> Result<Vec<RawRecord>, FeedError> {
        let response = self.fetch_response(game_id).await?;
        info!(
            game_id,
            actions = response.game.actions.len(),
            "play-by-play feed retrieved"
        );
        Ok(response.game.actions)
    }
}

/// In-memory feed keyed by game id.
#[derive(Debug, Clone, Default)]
pub struct FixedFeed {
    games: HashMap<String, Vec<RawRecord>>,
}

impl FixedFeed {
    /// Create an empty fixed feed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the records served for a game, replacing any previous set.
    #[must_use]
    pub fn with_game(mut self, game_id: impl Into<String>, records: Vec<RawRecord>) -> Self {
        self.games.insert(game_id.into(), records);
        self
    }

    /// Return a copy of the records for a game.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::UnknownGame`] if no records are registered.
    pub fn records(&self, game_id: &str) -> Result<Vec<RawRecord>, FeedError> {
        self.games
            .get(game_id)
            .cloned()
            .ok_or_else(|| FeedError::UnknownGame(game_id.to_owned()))
    }
}
