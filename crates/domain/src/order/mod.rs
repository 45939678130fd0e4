//! Order aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod read_model;
mod service;
mod status;

pub use aggregate::Order;
pub use commands::{CancelOrder, ConfirmOrder, CreateOrder};
pub use events::{OrderCancelledData, OrderConfirmedData, OrderCreatedData, OrderEvent};
pub use read_model::{OrderRow, OrderRowProjector};
pub use service::OrderService;
pub use status::OrderStatus;

use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Customer name is required.
    #[error("Customer name is required")]
    CustomerNameRequired,

    /// Product name is required.
    #[error("Product name is required")]
    ProductNameRequired,

    /// Invalid quantity.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Invalid price.
    #[error("Invalid total price: {price} (must not be negative)")]
    InvalidPrice { price: i64 },

    /// Order was already created.
    #[error("Order already exists")]
    AlreadyExists,

    /// No events exist for the order.
    #[error("Order not found")]
    NotFound,

    /// Order is not in a state that allows the action.
    #[error("Invalid state transition: cannot {action} from {current_status} status")]
    InvalidStateTransition {
        current_status: OrderStatus,
        action: &'static str,
    },
}

impl OrderError {
    /// True for malformed input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            OrderError::CustomerNameRequired
                | OrderError::ProductNameRequired
                | OrderError::InvalidQuantity { .. }
                | OrderError::InvalidPrice { .. }
        )
    }
}
