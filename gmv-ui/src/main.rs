//! gmv-ui - genealogy migration visualizer front end
//!
//! Serves the map page and its JSON API on top of a remote genealogy backend.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use gmv_common::config::{
    default_config_path, load_toml_config, CliOverrides, RootFolderInitializer, Settings,
};
use gmv_ui::client::BackendClient;
use gmv_ui::{build_router, db, AppState};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for gmv-ui
#[derive(Parser, Debug)]
#[command(name = "gmv-ui")]
#[command(about = "Genealogy migration visualizer front end")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "GMV_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding the local state database
    #[arg(short, long, env = "GMV_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Base URL of the genealogy REST API
    #[arg(long, env = "GMV_API_BASE_URL")]
    api_base_url: Option<String>,

    /// Bearer token for the genealogy API
    #[arg(long, env = "GMV_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Address to bind
    #[arg(long, env = "GMV_BIND_HOST")]
    bind_host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "GMV_PORT")]
    port: Option<u16>,

    /// Log level when RUST_LOG is not set
    #[arg(long, env = "GMV_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            root_folder: self.root_folder.clone(),
            api_base_url: self.api_base_url.clone(),
            api_token: self.api_token.clone(),
            bind_host: self.bind_host.clone(),
            port: self.port,
            log_level: self.log_level.clone(),
        }
    }
}

fn init_tracing(settings: &Settings) -> Result<()> {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    match &settings.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config file problems are reported after tracing is up
    let config_path = args.config.clone().or_else(|| default_config_path("gmv-ui"));
    let toml_config = config_path.as_deref().and_then(load_toml_config);
    let settings = Settings::resolve(args.overrides(), toml_config);

    init_tracing(&settings)?;

    // Build identification first, before any network or database delay
    info!(
        "Starting gmv-ui v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file found, using defaults"),
    }
    info!("Genealogy API: {}", settings.api_base_url);
    if settings.api_token.is_none() {
        warn!("No API token configured; requests are sent unauthenticated");
    }

    let initializer = RootFolderInitializer::new(settings.root_folder.clone());
    initializer.ensure_directory_exists()?;

    let db_path = initializer.database_path();
    let pool = match db::connect(&db_path).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to open local state database: {}", e);
            return Err(e.into());
        }
    };

    let backend = BackendClient::new(
        &settings.api_base_url,
        settings.api_token.clone(),
        Duration::from_secs(settings.request_timeout_secs),
    )?;

    let addr: SocketAddr = format!("{}:{}", settings.bind_host, settings.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", settings.bind_host, settings.port))?;

    let state = AppState::new(pool, backend, settings);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("gmv-ui listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install terminate handler: {}", e);
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
