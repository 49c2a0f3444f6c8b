//! Axum router construction for the broadcast server.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS and request tracing.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// - `GET /ws/game/{session}` -- producer/consumer `WebSocket`
/// - `GET /api/status` -- session and connection summary
/// - `POST /api/sessions/{session}/playback` -- start server-side playback
/// - `DELETE /api/sessions/{session}/playback` -- cancel it
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws/game/{session}", get(ws::ws_game))
        .route("/api/status", get(handlers::status))
        .route(
            "/api/sessions/{session}/playback",
            post(handlers::start_playback).delete(handlers::stop_playback),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
