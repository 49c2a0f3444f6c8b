//! Play-by-play feed retrieval for nbasim.
//!
//! The feed is the only source of historical data: given a game id it
//! returns the ordered list of [`RawRecord`] actions recorded for that game.
//! Records are returned in feed order; sorting onto the simulated timeline
//! is done later by the event preparer in `nbasim-core`.
//!
//! Two sources are provided behind [`Feed`]:
//!
//! - [`FeedClient`] fetches the public play-by-play JSON over HTTP via
//!   `reqwest`.
//! - [`FixedFeed`] serves records held in memory (tests, offline replays).

pub mod client;
pub mod error;
pub mod record;

pub use client::{Feed, FeedClient, FixedFeed, DEFAULT_URL_TEMPLATE};
pub use error::FeedError;
pub use record::{FeedGame, FeedMeta, PlayByPlayResponse, RawRecord};
