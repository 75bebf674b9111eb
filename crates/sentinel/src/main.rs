//! perf-sentinel - advertising performance monitor
//!
//! Ingests campaign metrics over HTTP, detects anomalies, synthesizes
//! patterns and raises threshold alerts on fixed schedules.

use anyhow::{Context, Result};
use perf_sentinel::{api, config::SentinelConfig};
use sentinel_lib::{health::HealthRegistry, observability::MonitorMetrics, Monitor};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting perf-sentinel");

    let config = SentinelConfig::load().context("Failed to load configuration")?;
    info!(
        instance = %config.instance,
        api_port = config.api_port,
        models = config.models.len(),
        thresholds = config.thresholds.len(),
        "Sentinel configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register_all().await;

    let metrics = MonitorMetrics::new();
    let monitor = Arc::new(Monitor::new(config.monitor_config(), health_registry)?);
    let app_state = Arc::new(api::AppState::new(monitor.clone(), metrics));

    monitor.start(None).await;

    let (stop_tx, mut stop_rx) = broadcast::channel::<()>(1);
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state, async move {
        let _ = stop_rx.recv().await;
    }));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    monitor.stop().await;
    let _ = stop_tx.send(());

    match api_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "API server failed"),
        Err(e) => error!(error = %e, "API server task panicked"),
    }

    info!("Shutdown complete");
    Ok(())
}
