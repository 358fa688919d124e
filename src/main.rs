//! Roman Broadcast Bridge - Main Entry Point
//!
//! A webhook service that:
//! 1. Receives conversation events from Roman
//! 2. Answers admin commands (`/help`, `/broadcast`, `/stats`) and `/version`
//! 3. Broadcasts admin messages to all subscribers and rings their phones

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

use roman_broadcast::server::{self, AppState};
use roman_broadcast::{AuthResolver, BridgeConfig, Dispatcher, InMemoryBroadcastStore, RomanClient, logging};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = BridgeConfig::from_env()?;

    // Initialize logging
    logging::init(config.json_logs);

    info!("🚀 Roman Broadcast Bridge starting...");
    info!(
        roman = %config.broadcast_url(),
        auth = ?config.auth_configuration_path,
        "📋 Configuration loaded"
    );

    let roman = match config.roman_timeout_secs {
        Some(secs) => RomanClient::with_timeout(config.broadcast_url(), Duration::from_secs(secs))
            .context("Failed to build Roman HTTP client")?,
        None => RomanClient::new(config.broadcast_url()),
    };

    let state = AppState {
        auth: AuthResolver::from_file(config.auth_configuration_path.clone()),
        dispatcher: Dispatcher::new(
            roman,
            Arc::new(InMemoryBroadcastStore::new()),
            config.release_file_path.clone(),
        ),
        release_file_path: config.release_file_path.clone(),
    };

    server::run_server(config.listen_addr(), state, shutdown_signal()).await?;

    info!("✅ Roman Broadcast Bridge stopped");
    Ok(())
}

/// Resolves on Ctrl-C
async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("📢 Shutdown signal received"),
        Err(err) => tracing::error!("Unable to listen for shutdown signal: {}", err),
    }
}
