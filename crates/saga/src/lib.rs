//! Saga orchestration for order placement.
//!
//! A saga is described as data ([`SagaDefinition`]) and run by the
//! [`SagaCoordinator`]. The order placement saga:
//!
//! 1. Create the order (compensated by cancelling it)
//! 2. Reserve inventory (the pivot)
//! 3. Confirm the order (retried, never compensated)
//!
//! If a step before or at the pivot fails, completed steps are compensated
//! newest first and the caller gets `success = false` together with the
//! saga log.

pub mod config;
pub mod coordinator;
pub mod definition;
pub mod error;
pub mod log;
pub mod services;

pub use config::SagaConfig;
pub use coordinator::{PlaceOrder, SagaContext, SagaCoordinator, SagaOutcome};
pub use definition::{SagaAction, SagaDefinition, SagaStep, StepKind};
pub use error::SagaError;
pub use log::{SagaLog, SagaLogEntry, StepStatus};
pub use services::{
    InventoryClient, LocalInventoryClient, LocalOrderClient, OrderClient, ProductInfo,
};
