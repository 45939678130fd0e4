//! Tracing and metrics bootstrap.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

use crate::config::{Config, LogFormat};

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when it parses.
pub fn init_tracing(config: &Config) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    }
}

/// Installs the Prometheus recorder.
///
/// With `METRICS_ADDR` set the exporter serves `/metrics` itself and no
/// handle is returned; otherwise the caller gets a handle to render from.
/// Must run inside the tokio runtime.
pub fn init_metrics(config: &Config) -> Result<Option<PrometheusHandle>, BuildError> {
    let builder = PrometheusBuilder::new();
    match config.metrics_addr {
        Some(addr) => {
            builder.with_http_listener(addr).install()?;
            tracing::info!(%addr, "serving Prometheus metrics");
            Ok(None)
        }
        None => Ok(Some(builder.install_recorder()?)),
    }
}
