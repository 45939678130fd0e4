//! Saga runtime configuration.

use std::time::Duration;

use crate::definition::DEFAULT_CONFIRM_ATTEMPTS;

/// Tunables for the saga coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SagaConfig {
    /// Upper bound on every remote call, compensations included.
    pub step_timeout: Duration,
    /// Attempts for the retriable steps after the pivot.
    pub confirm_attempts: u32,
    /// Pause between attempts of a retriable step.
    pub retry_backoff: Duration,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_millis(5000),
            confirm_attempts: DEFAULT_CONFIRM_ATTEMPTS,
            retry_backoff: Duration::from_millis(100),
        }
    }
}

impl SagaConfig {
    pub fn with_step_timeout(mut self, step_timeout: Duration) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    pub fn with_confirm_attempts(mut self, attempts: u32) -> Self {
        self.confirm_attempts = attempts;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
}
