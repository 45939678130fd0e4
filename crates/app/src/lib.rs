//! Order fulfillment service.
//!
//! Wires the event-sourced order and inventory services, the order
//! placement saga and the analytics projections into one process, with
//! configuration from the environment, structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod demo;
pub mod error;
pub mod system;
pub mod telemetry;

pub use config::{Config, ConfigError, LogFormat};
pub use demo::{DemoReport, run_demo};
pub use error::{AppError, Result};
pub use system::{FulfillmentSystem, InMemorySystem, PostgresSystem, connect_postgres, in_memory};
