//! Domain layer: event-sourced Order and Inventory aggregates.
//!
//! This crate provides:
//! - `Aggregate` and `DomainEvent` traits for replayable state
//! - `CommandHandler`, which decides one event per command, appends it with
//!   an expected version and publishes it after commit
//! - the Order and Inventory aggregates with their services and read models

pub mod aggregate;
pub mod command;
pub mod error;
pub mod inventory;
pub mod money;
pub mod order;

pub use aggregate::{Aggregate, DomainEvent};
pub use command::{Command, CommandHandler, CommandResult};
pub use error::DomainError;
pub use inventory::{
    CreateInventoryItem, InventoryError, InventoryEvent, InventoryItem, InventoryRow,
    InventoryRowProjector, InventoryService, ReleaseInventory, ReserveInventory,
    RestockInventory,
};
pub use money::Money;
pub use order::{
    CancelOrder, ConfirmOrder, CreateOrder, Order, OrderError, OrderEvent, OrderRow,
    OrderRowProjector, OrderService, OrderStatus,
};
