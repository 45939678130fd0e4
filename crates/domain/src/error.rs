//! Domain error types.

use event_store::EventStoreError;
use thiserror::Error;

use crate::inventory::InventoryError;
use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Malformed command input, rejected before touching the store.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// An error occurred in the order aggregate.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// An error occurred in the inventory aggregate.
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// True when the append lost an optimistic-concurrency race.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, DomainError::EventStore(e) if e.is_concurrency_conflict())
    }

    /// True for input errors that retrying cannot fix.
    pub fn is_validation(&self) -> bool {
        match self {
            DomainError::Validation(_) => true,
            DomainError::Order(e) => e.is_validation(),
            DomainError::Inventory(e) => e.is_validation(),
            _ => false,
        }
    }

    /// True when the command targeted an aggregate with no events.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DomainError::Order(OrderError::NotFound) | DomainError::Inventory(InventoryError::NotFound)
        )
    }
}
