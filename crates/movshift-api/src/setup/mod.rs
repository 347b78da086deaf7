//! Application setup and initialization

pub mod routes;
pub mod server;

use crate::state::AppState;
use anyhow::{Context, Result};
use movshift_core::Config;
use movshift_processing::FfmpegEncoder;
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Validate configuration first - fail fast on misconfiguration
    config
        .validate()
        .context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(config.log_format())
        .context("Failed to initialize telemetry")?;

    tracing::info!(
        environment = %config.environment(),
        "Configuration loaded and validated successfully"
    );

    let encoder = Arc::new(FfmpegEncoder::from_config(&config));
    let state = Arc::new(AppState::new(config.clone(), encoder));

    state
        .staging
        .ensure_root()
        .await
        .with_context(|| format!("Failed to create {}", config.staging_dir().display()))?;
    state
        .output
        .ensure_root()
        .await
        .with_context(|| format!("Failed to create {}", config.output_dir().display()))?;

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
