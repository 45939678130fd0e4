//! Application configuration loaded from environment variables.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use projections::SubscriberConfig;
use saga::SagaConfig;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected pretty or json, got {other}")),
        }
    }
}

/// Service configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `DATABASE_URL`: Postgres connection string; in-memory stores when unset
/// - `SAGA_STEP_TIMEOUT_MS`: per-call saga timeout (default: `5000`)
/// - `SAGA_CONFIRM_ATTEMPTS`: confirm attempts after the pivot (default: `3`)
/// - `EVENT_CHANNEL_CAPACITY`: publish channel size (default: `1024`)
/// - `PROJECTION_MAX_ATTEMPTS`: attempts per event before a gap (default: `5`)
/// - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
/// - `METRICS_ADDR`: Prometheus listener address; no listener when unset
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: Option<String>,
    pub saga_step_timeout: Duration,
    pub saga_confirm_attempts: u32,
    pub event_channel_capacity: usize,
    pub projection_max_attempts: u32,
    pub log_format: LogFormat,
    pub metrics_addr: Option<SocketAddr>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            saga_step_timeout: Duration::from_millis(5000),
            saga_confirm_attempts: 3,
            event_channel_capacity: 1024,
            projection_max_attempts: 5,
            log_format: LogFormat::Pretty,
            metrics_addr: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which returns the raw value of
    /// a variable if it is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            database_url: var("DATABASE_URL"),
            saga_step_timeout: parse(&var, "SAGA_STEP_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.saga_step_timeout),
            saga_confirm_attempts: positive(&var, "SAGA_CONFIRM_ATTEMPTS")?
                .unwrap_or(defaults.saga_confirm_attempts),
            event_channel_capacity: positive(&var, "EVENT_CHANNEL_CAPACITY")?
                .unwrap_or(defaults.event_channel_capacity),
            projection_max_attempts: positive(&var, "PROJECTION_MAX_ATTEMPTS")?
                .unwrap_or(defaults.projection_max_attempts),
            log_format: parse(&var, "LOG_FORMAT")?.unwrap_or(defaults.log_format),
            metrics_addr: parse(&var, "METRICS_ADDR")?,
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
        })
    }

    pub fn saga_config(&self) -> SagaConfig {
        SagaConfig::default()
            .with_step_timeout(self.saga_step_timeout)
            .with_confirm_attempts(self.saga_confirm_attempts)
    }

    pub fn subscriber_config(&self) -> SubscriberConfig {
        SubscriberConfig::default().with_max_attempts(self.projection_max_attempts)
    }
}

fn parse<T, F>(var: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::Invalid {
                    key,
                    value: value.clone(),
                    reason: e.to_string(),
                })
        })
        .transpose()
}

fn positive<T, F>(var: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr + Default + PartialEq,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match parse::<T, F>(var, key)? {
        Some(n) if n == T::default() => Err(ConfigError::Invalid {
            key,
            value: var(key).unwrap_or_default(),
            reason: "must be greater than zero".to_string(),
        }),
        other => Ok(other),
    }
}
