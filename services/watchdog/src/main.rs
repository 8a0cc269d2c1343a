//! rotor fleet-recycling watchdog.
//!
//! Periodically scans a fleet of preemptible-style compute instances,
//! selects the ones due for recycling inside the configured maintenance
//! window, and issues stop/start transitions within a global operation
//! budget. Restart bookkeeping is kept entirely in instance labels.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rotor_watchdog::client::HttpComputeClient;
use rotor_watchdog::config::Config;
use rotor_watchdog::reconciler::Watchdog;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let default_level = std::env::var("ROTOR_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting rotor watchdog");

    // Load configuration; malformed settings abort before any provider call
    let config = Config::from_env()?;
    info!(
        fleet_scope = %config.fleet_scope,
        restart_label = %config.restart_label,
        ops_limit = config.ops_limit,
        min_age_hours = config.min_age_hours,
        scan_interval_secs = config.scan_interval_secs,
        "Configuration loaded"
    );

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let api = Arc::new(HttpComputeClient::new(&config));
    let watchdog = Watchdog::new(api, config);

    let watchdog_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            watchdog.run(shutdown_rx).await;
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        _ = watchdog_handle => {
            info!("Recycling loop exited");
        }
    }

    // Signal shutdown to the worker
    let _ = shutdown_tx.send(true);

    // Give the loop time to finish the in-flight candidate
    info!("Waiting for the recycling loop to shut down...");
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;

    info!("Watchdog shutdown complete");
    Ok(())
}
