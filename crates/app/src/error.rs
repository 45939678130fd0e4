//! Application error type.

use domain::DomainError;
use event_store::EventStoreError;
use projections::ProjectionError;
use saga::SagaError;
use thiserror::Error;

/// Errors surfaced while wiring or driving the service.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    EventStore(#[from] EventStoreError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Saga(#[from] SagaError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

pub type Result<T> = std::result::Result<T, AppError>;
