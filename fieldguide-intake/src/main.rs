//! fieldguide-intake - Ticket Intake microservice
//!
//! **Module Identity:**
//! - Name: fieldguide-intake (Ticket Intake)
//! - Port: 5731
//!
//! Records tickets for the guide's active tour from a live camera decode
//! stream or manual photo entry, rejecting duplicates.

use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use fieldguide_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig};
use fieldguide_common::events::EventBus;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fieldguide_intake::AppState;

const MODULE_NAME: &str = "fieldguide-intake";
const DEFAULT_PORT: u16 = 5731;

/// Command-line arguments for fieldguide-intake
#[derive(Parser, Debug)]
#[command(name = "fieldguide-intake")]
#[command(about = "Ticket intake microservice for Fieldguide")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides TOML)
    #[arg(short, long, env = "FIELDGUIDE_PORT")]
    port: Option<u16>,

    /// Root folder holding the database and blobs
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Bootstrap TOML file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Step 1: Bootstrap config (read before logging so the level applies)
    let config_path = args
        .config
        .clone()
        .or_else(|| fieldguide_common::config::default_config_path(MODULE_NAME));
    let toml_config = match &config_path {
        Some(path) => fieldguide_common::config::load_toml_config(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => TomlConfig::default(),
    };

    init_tracing(&toml_config)?;

    info!("Starting fieldguide-intake (Ticket Intake) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Step 2: Resolve and create root folder
    let root_folder = RootFolderResolver::new(MODULE_NAME)
        .with_cli(args.root_folder.clone())
        .with_toml(toml_config.root_folder.clone())
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;

    // Step 3: Open or create database
    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = fieldguide_intake::db::init_database_pool(&db_path).await?;

    // Step 4: Signed-in guide (DB → ENV → TOML)
    let guide_user = fieldguide_intake::config::resolve_guide_user(&db_pool, &toml_config).await?;

    let port = args.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);
    let public_base_url = toml_config
        .public_base_url
        .clone()
        .unwrap_or_else(|| format!("http://127.0.0.1:{}", port));

    let event_bus = EventBus::new(toml_config.intake.event_capacity);
    info!(capacity = event_bus.capacity(), "Event bus initialized");

    let state = AppState::new(
        db_pool,
        event_bus,
        initializer.blob_root(),
        &public_base_url,
        toml_config.intake.clone(),
        guide_user,
    );
    let app = fieldguide_intake::build_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://127.0.0.1:{}/health", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Release camera and photo of a running session
    let session = state.intake.write().await.take();
    if let Some(session) = session {
        session.shutdown().await;
    }

    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over `logging.level`; `logging.file` adds a plain-text file layer
fn init_tracing(config: &TomlConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.as_str().into());

    let file_layer = match &config.logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
