//! Service entry point.

use std::error::Error;

use app::{Config, FulfillmentSystem};
use domain::{InventoryRow, OrderRow};
use event_store::{EventStore, ReadModelStore};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::signal;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install SIGINT handler");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn run<OS, IS>(
    system: FulfillmentSystem<OS, IS>,
    config: &Config,
    metrics: Option<PrometheusHandle>,
) -> Result<(), Box<dyn Error>>
where
    OS: EventStore + ReadModelStore<Row = OrderRow>,
    IS: EventStore + ReadModelStore<Row = InventoryRow>,
{
    let report = tokio::select! {
        report = app::run_demo(&system) => Some(report?),
        () = shutdown_signal() => None,
    };

    if let Some(report) = report {
        tracing::info!(
            placed = report.outcomes.len(),
            succeeded = report.succeeded(),
            "demo finished"
        );
        println!("{}", serde_json::to_string_pretty(&report)?);

        if let Some(handle) = &metrics {
            tracing::debug!(metrics = %handle.render(), "metrics snapshot");
        }
        if config.metrics_addr.is_some() {
            tracing::info!("serving metrics until shutdown signal");
            shutdown_signal().await;
        }
    }

    let gaps = system.shutdown().await;
    if !gaps.is_empty() {
        tracing::warn!(gaps = gaps.len(), "analytics gaps left for the next backfill");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // 1. Configuration and telemetry
    let config = Config::from_env()?;
    app::telemetry::init_tracing(&config)?;
    let metrics = app::telemetry::init_metrics(&config)?;

    // 2. Stores, services and the subscriber, then the demo run
    match config.database_url.clone() {
        Some(url) => {
            let system = app::connect_postgres(&url, &config).await?;
            run(system, &config, metrics).await
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory stores");
            run(app::in_memory(&config), &config, metrics).await
        }
    }
}
