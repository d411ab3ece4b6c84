//! # Structured Logging
//!
//! Installs the global `tracing` subscriber. `RUST_LOG` wins over the configured filter; the
//! output is JSON for deployments and a human-readable format for local work.

use crate::core::config::{LogFormat, LoggingConfig};
use crate::core::error::{ApiError, ApiResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber; fails if one is already set
pub fn init_logging(config: &LoggingConfig) -> ApiResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| ApiError::config(format!("Invalid log filter '{}': {}", config.filter, e)))?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .json(),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).pretty())
            .try_init(),
    };

    result.map_err(|e| ApiError::internal(format!("Failed to install log subscriber: {}", e)))
}
