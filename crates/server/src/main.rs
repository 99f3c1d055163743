use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transmute_core::{load_config_or_default, validate_config, CapabilityProbe};
use transmute_server::{api::create_router, state::AppState};

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

    // Determine config path
    let config_path = std::env::var("TRANSMUTE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("transmute.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Upload directory: {:?}", config.storage.upload_dir);
    info!("Output directory: {:?}", config.storage.output_dir);
    info!("Artifact expiry: {}s", config.lifecycle.expiry_secs);

    // Capability probe starts with in-process backends only
    let probe = Arc::new(CapabilityProbe::new());
    let state = Arc::new(AppState::from_config(config.clone(), Arc::clone(&probe)));

    // Nothing may outlive a restart
    let removed = state
        .lifecycle()
        .clear_on_startup()
        .await
        .context("Failed to clear storage directories")?;
    info!(removed, "Storage directories cleared");

    // Detect external tools in the background
    probe.spawn_detection(config.tools.clone());

    // Create router
    let app = create_router(Arc::clone(&state));

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    state.lifecycle().shutdown().await;
    info!("Artifact timers cancelled");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
