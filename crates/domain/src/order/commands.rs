//! Order commands.

use common::AggregateId;

use crate::command::Command;
use crate::money::Money;

use super::Order;

/// Command to create a new order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub order_id: AggregateId,
    pub customer_name: String,
    pub product_id: AggregateId,
    pub product_name: String,
    pub quantity: u32,
    /// Unit price times quantity, fixed at creation.
    pub total_price: Money,
}

impl CreateOrder {
    /// Creates a new CreateOrder command.
    pub fn new(
        order_id: AggregateId,
        customer_name: impl Into<String>,
        product_id: AggregateId,
        product_name: impl Into<String>,
        quantity: u32,
        total_price: Money,
    ) -> Self {
        Self {
            order_id,
            customer_name: customer_name.into(),
            product_id,
            product_name: product_name.into(),
            quantity,
            total_price,
        }
    }
}

impl Command for CreateOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to confirm a pending order.
#[derive(Debug, Clone)]
pub struct ConfirmOrder {
    pub order_id: AggregateId,
}

impl ConfirmOrder {
    pub fn new(order_id: AggregateId) -> Self {
        Self { order_id }
    }
}

impl Command for ConfirmOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to cancel a pending order.
#[derive(Debug, Clone)]
pub struct CancelOrder {
    pub order_id: AggregateId,
    pub reason: String,
}

impl CancelOrder {
    pub fn new(order_id: AggregateId, reason: impl Into<String>) -> Self {
        Self {
            order_id,
            reason: reason.into(),
        }
    }
}

impl Command for CancelOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}
