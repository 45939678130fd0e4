//! Saga error types.

use std::time::Duration;

use common::AggregateId;
use thiserror::Error;

use crate::definition::SagaAction;
use crate::log::SagaLog;

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The saga request was rejected before any step ran.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A remote service rejected or failed a call.
    #[error("{action} failed: {reason}")]
    RemoteCall { action: SagaAction, reason: String },

    /// The product lookup that precedes the first step failed.
    #[error("Product lookup for {product_id} failed: {reason}")]
    ProductLookup {
        product_id: AggregateId,
        reason: String,
    },

    /// A remote service did not answer within the step timeout.
    #[error("{action} timed out after {}ms", after.as_millis())]
    Timeout { action: SagaAction, after: Duration },

    /// A compensating action failed; the system is left inconsistent and
    /// needs manual reconciliation.
    #[error("Compensation failed for order {order_id}: {reason}")]
    CompensationFailed {
        order_id: AggregateId,
        reason: String,
        log: SagaLog,
    },

    /// A step after the pivot kept failing after all its attempts.
    #[error("Forward recovery failed for order {order_id}: {reason}")]
    ForwardRecoveryFailed {
        order_id: AggregateId,
        reason: String,
        log: SagaLog,
    },
}

impl SagaError {
    /// Creates a remote call error for the given action.
    pub fn remote(action: SagaAction, reason: impl ToString) -> Self {
        SagaError::RemoteCall {
            action,
            reason: reason.to_string(),
        }
    }

    /// Returns the saga log carried by terminal errors.
    pub fn saga_log(&self) -> Option<&SagaLog> {
        match self {
            SagaError::CompensationFailed { log, .. }
            | SagaError::ForwardRecoveryFailed { log, .. } => Some(log),
            _ => None,
        }
    }

    /// Returns true if the failure came from a remote call or its timeout.
    pub fn is_remote_failure(&self) -> bool {
        matches!(
            self,
            SagaError::RemoteCall { .. }
                | SagaError::Timeout { .. }
                | SagaError::ProductLookup { .. }
        )
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
