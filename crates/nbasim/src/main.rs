//! Command-line entry point for nbasim.
//!
//! Two subcommands share one configuration file:
//!
//! - `nbasim server` runs the broadcast server.
//! - `nbasim simulate --game-id ID` fetches a game's play-by-play feed and
//!   replays it, paced on the game clock, into a running server as the
//!   producer of session `ID`.
//!
//! # Configuration precedence
//!
//! Defaults, then the YAML file given with `--config`, then `NBASIM_*`
//! environment variables, then command-line flags.
//!
//! # Startup Sequence
//!
//! 1. Parse the command line
//! 2. Load configuration
//! 3. Initialize structured logging (tracing)
//! 4. Install the Ctrl-C handler
//! 5. Run the selected subcommand until it finishes or is cancelled

mod error;
mod producer_link;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use nbasim_core::config::{LogFormat, LoggingConfig, NbasimConfig};
use nbasim_core::{prepare_events, run_playback, SessionId, SpeedFactor};
use nbasim_feed::FeedClient;
use nbasim_server::{start_server, AppState, ServerConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::CliError;
use crate::producer_link::ProducerLink;

/// NBA play-by-play replay and broadcast.
#[derive(Debug, Parser)]
#[command(name = "nbasim", version, about)]
struct Cli {
    /// YAML configuration file.
    #[arg(long, global = true, env = "NBASIM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the broadcast server.
    Server {
        /// Address to bind.
        #[arg(long)]
        host: Option<String>,
        /// TCP port to listen on.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Replay a game into a running broadcast server.
    Simulate {
        /// Game id; also the session id on the server.
        #[arg(long)]
        game_id: String,
        /// Simulated seconds per real second.
        #[arg(long)]
        speed: Option<f64>,
        /// Delay before the first event, in milliseconds.
        #[arg(long)]
        start_delay_ms: Option<u64>,
        /// Base `WebSocket` URL of the broadcast server.
        #[arg(long)]
        server_url: Option<String>,
    },
}

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, the feed, or the selected
/// subcommand fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => NbasimConfig::from_file(path)?,
        None => NbasimConfig::from_env()?,
    };

    init_tracing(&config.logging);
    info!(version = env!("CARGO_PKG_VERSION"), "nbasim starting");

    let shutdown = CancellationToken::new();
    spawn_ctrl_c(shutdown.clone());

    match cli.command {
        Command::Server { host, port } => run_server(config, host, port, shutdown).await?,
        Command::Simulate {
            game_id,
            speed,
            start_delay_ms,
            server_url,
        } => {
            let mut config = config;
            if let Some(speed) = speed {
                config.playback.speed_factor = speed;
            }
            if let Some(delay) = start_delay_ms {
                config.playback.start_delay_ms = delay;
            }
            if let Some(url) = server_url {
                config.playback.server_url = url;
            }
            run_simulate(&config, SessionId::new(game_id), &shutdown).await?;
        }
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    match logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }
}

fn spawn_ctrl_c(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => warn!(error = %e, "cannot listen for Ctrl-C"),
        }
        shutdown.cancel();
    });
}

async fn run_server(
    mut config: NbasimConfig,
    host: Option<String>,
    port: Option<u16>,
    shutdown: CancellationToken,
) -> Result<(), CliError> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let feed = FeedClient::new(config.feed.url_template.clone(), config.feed.timeout())?;
    let state = Arc::new(AppState::with_config(feed.into(), &config));
    let server_config = ServerConfig::from(config.server.clone());
    info!(
        host = %server_config.host,
        port = server_config.port,
        queue_capacity = config.server.consumer_queue_capacity,
        "Configuration loaded"
    );

    start_server(&server_config, state, shutdown).await?;
    Ok(())
}

async fn run_simulate(
    config: &NbasimConfig,
    session: SessionId,
    shutdown: &CancellationToken,
) -> Result<(), CliError> {
    let speed = SpeedFactor::new(config.playback.speed_factor)?;

    let feed = FeedClient::new(config.feed.url_template.clone(), config.feed.timeout())?;
    let records = feed.fetch_records(session.as_str()).await?;
    let prepared = prepare_events(records);
    info!(
        %session,
        prepared = prepared.prepared(),
        skipped = prepared.skipped.len(),
        "events prepared"
    );

    let mut link = ProducerLink::connect(&config.playback.server_url, session.clone()).await?;
    let real_start_time = Utc::now()
        .checked_add_signed(
            chrono::TimeDelta::from_std(config.playback.start_delay()).unwrap_or_default(),
        )
        .unwrap_or_else(Utc::now);

    let report = run_playback(
        session,
        &prepared.events,
        real_start_time,
        speed.get(),
        &mut link,
        shutdown,
    )
    .await?;
    info!(
        end = ?report.end,
        delivered = report.delivered,
        total = report.total,
        failures = link.failures(),
        simulated_clock = report.simulated_clock,
        "playback complete"
    );

    link.close().await;
    Ok(())
}
