//! Projection error types.

use common::AggregateId;
use thiserror::Error;

/// Errors that can occur during projection processing.
///
/// These stay on the read side: a failing projection never fails a command.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// Failed to deserialize an event payload.
    #[error("Event deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The event refers to an order whose `OrderCreated` has not been
    /// projected yet.
    #[error("{projection}: {event_type} for order {aggregate_id} arrived before OrderCreated")]
    MissingPredecessor {
        projection: &'static str,
        aggregate_id: AggregateId,
        event_type: String,
    },
}

impl ProjectionError {
    /// True when the event may apply cleanly once earlier events arrive.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProjectionError::MissingPredecessor { .. })
    }
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
