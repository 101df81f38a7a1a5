//! Application setup and initialization
//!
//! Initialization lives here rather than in main.rs so tests can build the
//! same router without binding a socket.

pub mod routes;
pub mod server;

use crate::state::AppState;
use anyhow::{Context, Result};
use webexcel_core::Config;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(AppState, axum::Router)> {
    crate::telemetry::init_telemetry(&config).context("Failed to initialize telemetry")?;

    tracing::info!(
        default_field_name = %config.default_field_name,
        source_encoding = config.transcoder.map(|t| t.source()).unwrap_or("none"),
        target_encoding = config.transcoder.map(|t| t.target()).unwrap_or("none"),
        "Configuration loaded successfully"
    );

    let state = AppState::new(config);
    let router = routes::setup_routes(state.clone());

    Ok((state, router))
}
