//! Clock-paced playback.
//!
//! A [`PlaybackScheduler`] drives exactly one run for one session through
//! the phases
//!
//! ```text
//! Idle --> WaitingForStart --> Playing --> Finished
//!                 \               \
//!                  `---------------`--> Cancelled
//! ```
//!
//! While waiting it sleeps once for `max(0, real_start_time - now)`. While
//! playing it keeps a simulated clock (seconds, starting at 0) and, for each
//! event, sleeps until the event's offset is reached on the scaled
//! timeline before handing it to the [`EventSink`].
//!
//! Sleeps are computed against a fixed origin (`origin + offset / speed`)
//! rather than chained relative sleeps, so the real-time schedule does not
//! drift however many small gaps the recording contains.
//!
//! The scheduler task is the only owner of the simulated clock; no lock is
//! involved. A [`CancellationToken`] stops a run at its next suspension
//! point.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::event::Event;
use crate::session::SessionId;

/// Destination for events as the timeline reaches them.
///
/// Implementations attempt delivery and swallow their own failures
/// (logging them): a failed delivery must never stall the timeline.
pub trait EventSink: Send {
    /// Deliver one event.
    fn deliver(&mut self, event: &Event) -> impl Future<Output = ()> + Send;
}

/// Errors that can occur when setting up or starting a playback.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlaybackError {
    /// The speed factor must be finite and strictly positive.
    #[error("invalid speed factor {0}: must be finite and > 0")]
    InvalidSpeedFactor(f64),

    /// A scheduler drives exactly one run.
    #[error("playback already started (phase {0:?})")]
    AlreadyStarted(PlaybackPhase),
}

/// Lifecycle phase of a [`PlaybackScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackPhase {
    /// Created, not yet started.
    Idle,
    /// Sleeping until the real start time.
    WaitingForStart,
    /// Walking the event sequence.
    Playing,
    /// Every event was delivered.
    Finished,
    /// Stopped early by the cancellation signal.
    Cancelled,
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackEnd {
    /// The last event was delivered.
    Finished,
    /// The cancellation signal fired.
    Cancelled,
}

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackReport {
    /// Session the run belonged to.
    pub session: SessionId,
    /// How the run ended.
    pub end: PlaybackEnd,
    /// Number of events handed to the sink.
    pub delivered: usize,
    /// Number of events in the sequence.
    pub total: usize,
    /// Simulated clock when the run ended.
    pub simulated_clock: i64,
}

/// Multiplier applied to simulated time; `> 1` plays faster than real time.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct SpeedFactor(f64);

impl SpeedFactor {
    /// Validate a speed factor.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::InvalidSpeedFactor`] unless `factor` is
    /// finite and strictly positive.
    pub fn new(factor: f64) -> Result<Self, PlaybackError> {
        if factor.is_finite() && factor > 0.0 {
            Ok(Self(factor))
        } else {
            Err(PlaybackError::InvalidSpeedFactor(factor))
        }
    }

    /// The raw multiplier.
    pub const fn get(self) -> f64 {
        self.0
    }

    /// Real time needed to cover `simulated_seconds` at this speed.
    ///
    /// Negative spans map to zero; spans too long to represent saturate.
    pub fn real_duration(self, simulated_seconds: i64) -> Duration {
        if simulated_seconds <= 0 {
            return Duration::ZERO;
        }
        // Offsets stay far below 2^52, so the conversion is exact.
        #[allow(clippy::cast_precision_loss)]
        let seconds = simulated_seconds as f64;
        Duration::try_from_secs_f64(seconds / self.0).unwrap_or(Duration::MAX)
    }
}

/// Drives one playback run for one session.
#[derive(Debug)]
pub struct PlaybackScheduler {
    session: SessionId,
    speed: SpeedFactor,
    real_start_time: DateTime<Utc>,
    simulated_clock: i64,
    phase: PlaybackPhase,
}

impl PlaybackScheduler {
    /// Create an idle scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::InvalidSpeedFactor`] for a non-positive or
    /// non-finite speed factor.
    pub fn new(
        session: SessionId,
        speed_factor: f64,
        real_start_time: DateTime<Utc>,
    ) -> Result<Self, PlaybackError> {
        Ok(Self {
            session,
            speed: SpeedFactor::new(speed_factor)?,
            real_start_time,
            simulated_clock: 0,
            phase: PlaybackPhase::Idle,
        })
    }

    /// Current phase.
    pub const fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    /// Current simulated clock, in seconds.
    pub const fn simulated_clock(&self) -> i64 {
        self.simulated_clock
    }

    /// The validated speed factor.
    pub const fn speed(&self) -> SpeedFactor {
        self.speed
    }

    /// Run the playback to completion or cancellation.
    ///
    /// `events` must be sorted by offset (as produced by
    /// [`prepare_events`](crate::event::prepare_events)). An event behind
    /// the simulated clock is clamped forward and delivered immediately.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::AlreadyStarted`] if this scheduler has
    /// already run.
    pub async fn run<S: EventSink>(
        &mut self,
        events: &[Event],
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<PlaybackReport, PlaybackError> {
        if self.phase != PlaybackPhase::Idle {
            return Err(PlaybackError::AlreadyStarted(self.phase));
        }

        info!(
            session = %self.session,
            events = events.len(),
            speed_factor = self.speed.get(),
            real_start_time = %self.real_start_time.to_rfc3339(),
            "playback scheduled"
        );

        self.phase = PlaybackPhase::WaitingForStart;
        if !self.wait_for_start(cancel).await {
            return Ok(self.cancelled(0, events.len()));
        }

        self.phase = PlaybackPhase::Playing;
        info!(session = %self.session, "playback started");
        let origin = Instant::now();
        let mut delivered: usize = 0;

        for (index, event) in events.iter().enumerate() {
            let offset = event.simulated_offset_seconds;
            debug!(
                session = %self.session,
                index,
                offset,
                simulated_clock = self.simulated_clock,
                "next event"
            );

            if offset > self.simulated_clock {
                let real_offset = self.speed.real_duration(offset);
                let sleep = match origin.checked_add(real_offset) {
                    Some(deadline) => tokio::time::sleep_until(deadline),
                    None => tokio::time::sleep(real_offset),
                };
                tokio::select! {
                    () = sleep => {}
                    () = cancel.cancelled() => {
                        return Ok(self.cancelled(delivered, events.len()));
                    }
                }
                self.simulated_clock = offset;
            } else if offset < self.simulated_clock {
                debug!(
                    session = %self.session,
                    offset,
                    simulated_clock = self.simulated_clock,
                    "event behind simulated clock, delivering immediately"
                );
            }

            sink.deliver(event).await;
            delivered = delivered.saturating_add(1);
        }

        self.phase = PlaybackPhase::Finished;
        info!(
            session = %self.session,
            delivered,
            simulated_clock = self.simulated_clock,
            "playback finished"
        );
        Ok(PlaybackReport {
            session: self.session.clone(),
            end: PlaybackEnd::Finished,
            delivered,
            total: events.len(),
            simulated_clock: self.simulated_clock,
        })
    }

    /// Sleep once until the real start time. Returns `false` if cancelled.
    async fn wait_for_start(&self, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        let remaining = (self.real_start_time - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        if remaining.is_zero() {
            return true;
        }

        info!(
            session = %self.session,
            seconds = remaining.as_secs_f64(),
            "waiting for playback start"
        );
        tokio::select! {
            () = tokio::time::sleep(remaining) => true,
            () = cancel.cancelled() => false,
        }
    }

    fn cancelled(&mut self, delivered: usize, total: usize) -> PlaybackReport {
        self.phase = PlaybackPhase::Cancelled;
        info!(
            session = %self.session,
            delivered,
            total,
            simulated_clock = self.simulated_clock,
            "playback cancelled"
        );
        PlaybackReport {
            session: self.session.clone(),
            end: PlaybackEnd::Cancelled,
            delivered,
            total,
            simulated_clock: self.simulated_clock,
        }
    }
}

/// Create a scheduler and run it in one call.
///
/// # Errors
///
/// Returns [`PlaybackError::InvalidSpeedFactor`] for a bad speed factor.
pub async fn run_playback<S: EventSink>(
    session: SessionId,
    events: &[Event],
    real_start_time: DateTime<Utc>,
    speed_factor: f64,
    sink: &mut S,
    cancel: &CancellationToken,
) -> Result<PlaybackReport, PlaybackError> {
    let mut scheduler = PlaybackScheduler::new(session, speed_factor, real_start_time)?;
    scheduler.run(events, sink, cancel).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn speed_factor_rejects_non_positive_values() {
        assert!(SpeedFactor::new(0.0).is_err());
        assert!(SpeedFactor::new(-1.0).is_err());
        assert!(SpeedFactor::new(f64::NAN).is_err());
        assert!(SpeedFactor::new(f64::INFINITY).is_err());
        assert!(SpeedFactor::new(0.25).is_ok());
    }

    #[test]
    fn real_duration_divides_by_speed() {
        let speed = SpeedFactor::new(4.0).unwrap();
        assert_eq!(speed.real_duration(10), Duration::from_millis(2500));
        assert_eq!(speed.real_duration(0), Duration::ZERO);
        assert_eq!(speed.real_duration(-30), Duration::ZERO);

        let slow = SpeedFactor::new(0.5).unwrap();
        assert_eq!(slow.real_duration(3), Duration::from_secs(6));
    }

    #[test]
    fn new_scheduler_is_idle() {
        let scheduler = PlaybackScheduler::new(SessionId::from("g"), 2.0, Utc::now()).unwrap();
        assert_eq!(scheduler.phase(), PlaybackPhase::Idle);
        assert_eq!(scheduler.simulated_clock(), 0);
    }
}
