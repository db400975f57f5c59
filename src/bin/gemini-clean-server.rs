use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gemini_clean::api::{create_router, AppState};
use gemini_clean::{load_config, validate_config, HttpUploader, JobOrchestrator, WatermarkEngine};

/// Environment variable naming the configuration file.
const CONFIG_ENV: &str = "GEMINI_CLEAN_CONFIG";

/// Used when [`CONFIG_ENV`] is unset; may be absent.
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // An explicitly named file must exist
    let (config_path, required) = match std::env::var(CONFIG_ENV) {
        Ok(path) => (PathBuf::from(path), true),
        Err(_) => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path, required)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    info!("Storage root: {:?}", config.storage.base_dir);
    info!("Assets directory: {:?}", config.assets.dir);

    // Without masks there is nothing to serve
    let engine = WatermarkEngine::load(
        &config.assets.mask_small_path(),
        &config.assets.mask_large_path(),
    )
    .context("Failed to load alpha masks")?;
    info!("Alpha masks loaded");

    let uploader = HttpUploader::new(config.upload.timeout(), config.upload.retries)
        .context("Failed to create upload client")?;
    info!(
        "Upload client ready (timeout: {:?}, retries: {})",
        config.upload.timeout(),
        config.upload.retries
    );

    let mut orchestrator = JobOrchestrator::new(Arc::new(engine), Arc::new(uploader));
    if let Some(retention) = config.jobs.retention() {
        info!("Finished jobs are kept for {:?}", retention);
        orchestrator = orchestrator.with_retention(retention);
    }

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, orchestrator));
    let app = create_router(Arc::clone(&state));

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!(
        "Shutting down, cancelling {} running job(s)",
        state.orchestrator().running_jobs()
    );
    state.orchestrator().shutdown().await;
    info!("All jobs stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
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
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
