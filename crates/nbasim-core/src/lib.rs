//! Replay core for nbasim.
//!
//! Turns a historical play-by-play feed into a paced stream of events:
//!
//! ```text
//! RawRecord --> clock::compute_offset --> event::prepare_events --> playback (paced) --> EventSink
//! ```
//!
//! - [`clock`] maps a period clock string and period number onto the
//!   simulated timeline (seconds since the nominal start).
//! - [`event`] builds the sorted [`Event`] sequence for one playback,
//!   skipping records whose clock cannot be read.
//! - [`playback`] drives one run: waits for the real start time, then
//!   sleeps between events scaled by the speed factor and hands each
//!   event to an [`EventSink`].
//! - [`config`] holds the typed YAML configuration shared by the server
//!   and the CLI.

pub mod clock;
pub mod config;
pub mod event;
pub mod playback;
pub mod session;

pub use clock::{compute_offset, ClockError};
pub use event::{prepare_events, Event, PreparedEvents, SkippedRecord};
pub use playback::{
    run_playback, EventSink, PlaybackEnd, PlaybackError, PlaybackPhase, PlaybackReport,
    PlaybackScheduler, SpeedFactor,
};
pub use session::SessionId;
