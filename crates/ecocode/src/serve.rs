// SPDX-FileCopyrightText: 2026 Ecocode Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `ecocode serve` implementation.

use ecocode_config::EcocodeConfig;
use ecocode_core::EcocodeError;
use ecocode_gateway::{GatewayState, ServerConfig, start_server};
use tracing::info;

use crate::shutdown;

/// Runs the gateway until SIGINT/SIGTERM.
pub async fn run_serve(config: EcocodeConfig) -> Result<(), EcocodeError> {
    init_tracing(&config.logging.level);

    info!(
        backend = %config.backend.base_url,
        max_attempts = config.polling.max_attempts,
        interval_ms = config.polling.interval_ms,
        "starting ecocode gateway"
    );

    let cancel = shutdown::install_signal_handler();
    let state = GatewayState::from_config(&config, cancel)?;
    start_server(&ServerConfig::from(&config.gateway), state).await?;

    info!("ecocode shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber with the configured log level.
/// `RUST_LOG` takes precedence when set.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ecocode={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
