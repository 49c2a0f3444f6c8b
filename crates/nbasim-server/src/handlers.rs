//! REST API endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/status` | Server, session, and connection summary |
//! | `POST` | `/api/sessions/{session}/playback` | Start server-side playback |
//! | `DELETE` | `/api/sessions/{session}/playback` | Cancel server-side playback |

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use nbasim_core::{prepare_events, SessionId, SpeedFactor};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::playback::PlaybackInfo;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET /api/status
// ---------------------------------------------------------------------------

/// Response body for `GET /api/status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Always `"running"` while the server answers.
    pub server_status: String,
    /// Sessions with a producer connection or an active playback.
    pub producer_session_count: usize,
    /// Consumer connections across all sessions.
    pub consumer_connection_count: usize,
    /// Connections of either role across all sessions.
    pub total_connection_count: usize,
    /// Ids counted in `producer_session_count`, sorted.
    pub producer_session_ids: Vec<SessionId>,
    /// Sessions with an active server-side playback, sorted.
    pub active_playbacks: Vec<SessionId>,
}

/// Summarise sessions and connections.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let stats = state.registry.stats().await;
    let active_playbacks = state.playbacks.active_sessions().await;

    let mut producer_session_ids: Vec<SessionId> = stats
        .producer_sessions()
        .cloned()
        .chain(active_playbacks.iter().cloned())
        .collect();
    producer_session_ids.sort();
    producer_session_ids.dedup();

    Json(StatusResponse {
        server_status: "running".to_owned(),
        producer_session_count: producer_session_ids.len(),
        consumer_connection_count: stats.consumer_connections(),
        total_connection_count: stats.total_connections(),
        producer_session_ids,
        active_playbacks,
    })
}

// ---------------------------------------------------------------------------
// POST /api/sessions/{session}/playback
// ---------------------------------------------------------------------------

/// Request body for `POST /api/sessions/{session}/playback`.
///
/// Omitted fields fall back to the configured playback defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StartPlaybackRequest {
    /// Simulated seconds per real second.
    pub speed_factor: Option<f64>,
    /// Delay before the timeline starts.
    pub start_delay_ms: Option<u64>,
}

/// Fetch the session's feed and start playing it into the local hub.
///
/// Feed failure aborts the request with `502` before anything is sent.
pub async fn start_playback(
    State(state): State<Arc<AppState>>,
    Path(session): Path<String>,
    Json(request): Json<StartPlaybackRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = SessionId::from(session);
    let defaults = &state.playback_defaults;

    let speed_factor = SpeedFactor::new(request.speed_factor.unwrap_or(defaults.speed_factor))
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
    if state.playbacks.get(&session).await.is_some() {
        return Err(ApiError::Conflict(format!(
            "playback already active for session {session}"
        )));
    }

    let records = state.feed.fetch_records(session.as_str()).await?;
    let prepared = prepare_events(records);
    info!(
        %session,
        prepared = prepared.prepared(),
        skipped = prepared.skipped.len(),
        "events prepared"
    );

    let delay_ms = request.start_delay_ms.unwrap_or(defaults.start_delay_ms);
    let real_start_time = i64::try_from(delay_ms)
        .ok()
        .and_then(chrono::Duration::try_milliseconds)
        .and_then(|delay| Utc::now().checked_add_signed(delay))
        .ok_or_else(|| ApiError::InvalidRequest(format!("start_delay_ms {delay_ms} too large")))?;

    let info: PlaybackInfo = state
        .playbacks
        .start(
            state.hub.clone(),
            session,
            prepared,
            real_start_time,
            speed_factor,
        )
        .await
        .map_err(|e| ApiError::Conflict(e.to_string()))?;

    Ok((StatusCode::ACCEPTED, Json(info)))
}

// ---------------------------------------------------------------------------
// DELETE /api/sessions/{session}/playback
// ---------------------------------------------------------------------------

/// Cancel the session's server-side playback.
pub async fn stop_playback(
    State(state): State<Arc<AppState>>,
    Path(session): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = SessionId::from(session);
    if !state.playbacks.stop(&session).await {
        return Err(ApiError::NotFound(format!(
            "no active playback for session {session}"
        )));
    }

    Ok(Json(serde_json::json!({
        "ok": true,
        "session": session,
        "message": "Playback cancellation requested",
    })))
}
