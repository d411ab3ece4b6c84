//! # QR Menu API - Main Entry Point
//!
//! Startup sequence:
//! 1. load `.env` (if present) and the layered configuration
//! 2. install logging and the Prometheus recorder
//! 3. build the application (store, cache layer, repository, router)
//! 4. serve until SIGINT/SIGTERM, then drain cache writes and close the store

use anyhow::Context;
use qarmenu_api::core::config::{AppConfig, DEFAULT_CONFIG_PATH};
use qarmenu_api::observability::{init_logging, install_prometheus};
use qarmenu_api::AppServer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // a missing .env is normal outside development
    let dotenv = dotenvy::dotenv();

    let config_path =
        std::env::var("APP_CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = AppConfig::load(&config_path)
        .await
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    init_logging(&config.logging).context("Failed to initialize logging")?;
    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    let metrics = match install_prometheus() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics disabled: {}", e);
            None
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "🍽️  Starting QR Menu API"
    );

    let server = AppServer::build(config, metrics).context("Failed to build application")?;
    server.run().await.context("Server terminated with an error")?;

    Ok(())
}
