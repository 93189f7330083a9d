//! ajl-web: accessibility journey workshop service
//!
//! Serves the workshop HTTP API over a single SQLite file and a local
//! evidence object store, both kept under the resolved root folder.

use ajl_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig};
use ajl_common::db::{init_database, workshop_state};
use ajl_common::phase::{DatabasePhaseSource, PhasePoller};
use ajl_common::{EventBus, ObjectStore, PhaseStore};
use ajl_web::drafts::{DRAFT_IDLE_TIMEOUT, DRAFT_SWEEP_INTERVAL};
use ajl_web::{build_router, AppState, DraftSweeper, ServiceSettings};
use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Workshop events kept for slow SSE clients
const EVENT_BUS_CAPACITY: usize = 100;

#[derive(Parser, Debug)]
#[command(name = "ajl-web")]
#[command(about = "Accessibility journey workshop service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "AJL_PORT")]
    port: Option<u16>,

    /// Folder holding the database and evidence files
    #[arg(short, long, env = "AJL_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds between phase re-reads (overrides the config file)
    #[arg(long)]
    poll_interval: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load_or_default(args.config.as_deref());

    let level = &config.logging.level;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("ajl_web={level},ajl_common={level},tower_http={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ajl-web v{}", env!("CARGO_PKG_VERSION"));

    let root_folder = RootFolderResolver::new()
        .with_cli_arg(args.root_folder)
        .with_config(&config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .with_context(|| format!("Failed to create root folder {}", initializer.root().display()))?;
    info!("Root folder: {}", initializer.root().display());

    let db_path = initializer.database_path();
    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let object_store = ObjectStore::new(initializer.evidence_dir());

    let initial_phase = match workshop_state::read_phase(&pool).await {
        Ok(phase) => phase,
        Err(e) => {
            warn!("Could not read workshop phase, starting in the default: {}", e);
            Default::default()
        }
    };
    info!(phase = %initial_phase, "Workshop phase loaded");
    let phase_store = PhaseStore::new(initial_phase);

    let poll_interval = args
        .poll_interval
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.poll_interval());
    let (refresh_tx, refresh_rx) = mpsc::channel(1);
    let poller = PhasePoller::spawn(
        phase_store.clone(),
        Arc::new(DatabasePhaseSource::new(pool.clone())),
        poll_interval,
        refresh_rx,
    );

    let settings = ServiceSettings {
        phase_labels: config.phase_labels(),
        journey_code_prefix: config.journey_code_prefix.clone(),
    };
    let state = AppState::new(
        pool.clone(),
        phase_store,
        refresh_tx,
        EventBus::new(EVENT_BUS_CAPACITY),
        object_store,
        settings,
    );

    let sweeper = DraftSweeper::spawn(state.wizards.clone(), DRAFT_SWEEP_INTERVAL, DRAFT_IDLE_TIMEOUT);

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let port = args.port.unwrap_or(config.port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("ajl-web listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeper.shutdown().await;
    poller.shutdown().await;
    pool.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
