//! Broadcast server lifecycle management.
//!
//! [`start_server`] binds the configured address; [`serve`] runs the
//! router on an already-bound listener. Both return once the
//! [`CancellationToken`] fires and in-flight requests have drained.

use std::net::SocketAddr;
use std::sync::Arc;

use nbasim_core::config::ListenConfig;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Listen address of the broadcast server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host name or address to bind (e.g. `localhost`, `0.0.0.0`).
    pub host: String,
    /// The TCP port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ListenConfig::default().into()
    }
}

impl From<ListenConfig> for ServerConfig {
    fn from(config: ListenConfig) -> Self {
        Self {
            host: config.host,
            port: config.port,
        }
    }
}

/// Bind the configured address and serve until `shutdown` fires.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address cannot be bound and
/// [`ServerError::Serve`] if the server fails while running.
pub async fn start_server(
    config: &ServerConfig,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {}:{}: {e}", config.host, config.port)))?;
    serve(listener, state, shutdown).await
}

/// Serve the router on `listener` until `shutdown` fires.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] if the server fails while running.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let addr: SocketAddr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("listener has no address: {e}")))?;
    info!(%addr, "broadcast server listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))?;

    info!(%addr, "broadcast server stopped");
    Ok(())
}

/// Errors that can occur when starting or running the broadcast server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}
