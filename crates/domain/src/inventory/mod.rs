//! Inventory item aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod read_model;
mod service;

pub use aggregate::InventoryItem;
pub use commands::{CreateInventoryItem, ReleaseInventory, ReserveInventory, RestockInventory};
pub use events::{
    InventoryEvent, InventoryItemCreatedData, InventoryReleasedData, InventoryReservedData,
    InventoryRestockedData,
};
pub use read_model::{InventoryRow, InventoryRowProjector};
pub use service::InventoryService;

use thiserror::Error;

/// Errors that can occur during inventory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Product name is required.
    #[error("Product name is required")]
    NameRequired,

    /// Invalid quantity.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Invalid price.
    #[error("Invalid price: {price} (must not be negative)")]
    InvalidPrice { price: i64 },

    /// Item was already created.
    #[error("Inventory item already exists")]
    AlreadyExists,

    /// No events exist for the item.
    #[error("Inventory item not found")]
    NotFound,

    /// Reservation would drive `available` below zero.
    #[error("Insufficient inventory: requested {requested}, available {available}")]
    InsufficientInventory { requested: u32, available: u32 },

    /// Restock would push the quantity on hand past what can be counted.
    #[error("Cannot restock {requested} units on top of {on_hand} on hand")]
    QuantityOverflow { on_hand: u32, requested: u32 },

    /// Release of more units than are currently reserved.
    #[error("Cannot release {requested} units, only {reserved} reserved")]
    ReleaseExceedsReserved { requested: u32, reserved: u32 },
}

impl InventoryError {
    /// True for malformed input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            InventoryError::NameRequired
                | InventoryError::InvalidQuantity { .. }
                | InventoryError::InvalidPrice { .. }
                | InventoryError::QuantityOverflow { .. }
        )
    }
}
