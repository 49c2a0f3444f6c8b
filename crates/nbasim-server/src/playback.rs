//! Server-side playback runs.
//!
//! [`PlaybackManager`] tracks at most one active run per session, each on
//! its own task with its own cancellation token. Runs remove themselves
//! when they finish or are cancelled.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use nbasim_core::{run_playback, PreparedEvents, SessionId, SpeedFactor};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::hub::BroadcastHub;
use crate::sink::HubSink;

/// Public description of a started run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackInfo {
    /// Session being played.
    pub session: SessionId,
    /// Run identifier, unique within this process.
    pub run_id: u64,
    /// Events scheduled.
    pub prepared: usize,
    /// Records skipped for unreadable clocks.
    pub skipped: usize,
    /// Wall-clock start of the timeline.
    pub real_start_time: DateTime<Utc>,
    /// Speed multiplier.
    pub speed_factor: SpeedFactor,
}

/// A session already has an active run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("playback already active for session {0}")]
pub struct PlaybackActive(pub SessionId);

#[derive(Debug)]
struct ActivePlayback {
    info: PlaybackInfo,
    cancel: CancellationToken,
}

/// Registry of active server-side runs.
#[derive(Debug, Default)]
pub struct PlaybackManager {
    active: Mutex<HashMap<SessionId, ActivePlayback>>,
    next_run_id: AtomicU64,
}

impl PlaybackManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a run for `session` delivering through `hub`.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackActive`] if the session already has a run.
    pub async fn start(
        self: &Arc<Self>,
        hub: BroadcastHub,
        session: SessionId,
        prepared: PreparedEvents,
        real_start_time: DateTime<Utc>,
        speed_factor: SpeedFactor,
    ) -> Result<PlaybackInfo, PlaybackActive> {
        let mut active = self.active.lock().await;
        if active.contains_key(&session) {
            return Err(PlaybackActive(session));
        }

        let run_id = self.next_run_id.fetch_add(1, Ordering::Relaxed);
        let info = PlaybackInfo {
            session: session.clone(),
            run_id,
            prepared: prepared.prepared(),
            skipped: prepared.skipped.len(),
            real_start_time,
            speed_factor,
        };
        let cancel = CancellationToken::new();
        active.insert(
            session.clone(),
            ActivePlayback {
                info: info.clone(),
                cancel: cancel.clone(),
            },
        );

        let manager = Arc::clone(self);
        let events = prepared.events;
        tokio::spawn(async move {
            let mut sink = HubSink::new(hub, session.clone());
            match run_playback(
                session.clone(),
                &events,
                real_start_time,
                speed_factor.get(),
                &mut sink,
                &cancel,
            )
            .await
            {
                Ok(report) => info!(
                    %session,
                    run_id,
                    end = ?report.end,
                    delivered = report.delivered,
                    total = report.total,
                    "server-side playback ended"
                ),
                Err(e) => error!(%session, run_id, error = %e, "server-side playback failed"),
            }
            manager.finish(&session, run_id).await;
        });

        info!(
            session = %info.session,
            run_id,
            prepared = info.prepared,
            skipped = info.skipped,
            "server-side playback started"
        );
        Ok(info)
    }

    /// Fire the cancellation signal of `session`'s run.
    ///
    /// Returns `false` if the session has no active run.
    pub async fn stop(&self, session: &SessionId) -> bool {
        let active = self.active.lock().await;
        active.get(session).is_some_and(|run| {
            run.cancel.cancel();
            info!(%session, run_id = run.info.run_id, "server-side playback cancellation requested");
            true
        })
    }

    /// Sessions with an active run, sorted.
    pub async fn active_sessions(&self) -> Vec<SessionId> {
        let active = self.active.lock().await;
        let mut sessions: Vec<SessionId> = active.keys().cloned().collect();
        sessions.sort();
        sessions
    }

    /// Description of `session`'s active run, if any.
    pub async fn get(&self, session: &SessionId) -> Option<PlaybackInfo> {
        let active = self.active.lock().await;
        active.get(session).map(|run| run.info.clone())
    }

    async fn finish(&self, session: &SessionId, run_id: u64) {
        let mut active = self.active.lock().await;
        if active
            .get(session)
            .is_some_and(|run| run.info.run_id == run_id)
        {
            active.remove(session);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use nbasim_core::prepare_events;
    use nbasim_feed::RawRecord;

    use super::*;
    use crate::registry::ConnectionRegistry;

    fn hub() -> BroadcastHub {
        BroadcastHub::new(Arc::new(ConnectionRegistry::new()))
    }

    fn long_game() -> PreparedEvents {
        prepare_events(vec![
            RawRecord::new("PT12M00.00S", 1, "period"),
            RawRecord::new("PT00M00.00S", 4, "period"),
        ])
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_for_same_session_conflicts() {
        let manager = Arc::new(PlaybackManager::new());
        let session = SessionId::from("g");
        let speed = SpeedFactor::new(1.0).unwrap();

        manager
            .start(hub(), session.clone(), long_game(), Utc::now(), speed)
            .await
            .unwrap();
        let again = manager
            .start(hub(), session.clone(), long_game(), Utc::now(), speed)
            .await;
        assert_eq!(again.unwrap_err(), PlaybackActive(session.clone()));
        assert_eq!(manager.active_sessions().await, vec![session]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_and_removes_run() {
        let manager = Arc::new(PlaybackManager::new());
        let session = SessionId::from("g");
        let speed = SpeedFactor::new(1.0).unwrap();
        manager
            .start(hub(), session.clone(), long_game(), Utc::now(), speed)
            .await
            .unwrap();

        assert!(manager.stop(&session).await);
        // Let the run task observe the signal and deregister.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(manager.active_sessions().await.is_empty());
        assert!(!manager.stop(&session).await);
    }

    #[tokio::test(start_paused = true)]
    async fn finished_run_removes_itself() {
        let manager = Arc::new(PlaybackManager::new());
        let session = SessionId::from("g");
        let prepared = prepare_events(vec![RawRecord::new("PT11M59.00S", 1, "jumpball")]);
        let info = manager
            .start(
                hub(),
                session.clone(),
                prepared,
                Utc::now(),
                SpeedFactor::new(2.0).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(info.prepared, 1);
        assert!(manager.get(&session).await.is_some());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(manager.get(&session).await.is_none());
    }
}
