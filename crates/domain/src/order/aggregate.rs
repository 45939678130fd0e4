//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, AggregateKind};
use event_store::Version;

use crate::aggregate::Aggregate;
use crate::money::Money;

use super::{
    CreateOrder, OrderError, OrderEvent, OrderStatus,
    events::{OrderCancelledData, OrderCreatedData},
};

/// Order aggregate root.
///
/// A single-product order that starts `PENDING` and ends either `CONFIRMED`
/// or `CANCELLED`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Order {
    id: Option<AggregateId>,
    version: Version,
    customer_name: String,
    product_id: Option<AggregateId>,
    product_name: String,
    quantity: u32,
    total_price: Money,
    status: OrderStatus,
    cancel_reason: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        AggregateKind::Order.as_str()
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::OrderCreated(data) => self.apply_order_created(data),
            OrderEvent::OrderConfirmed(_) => self.status = OrderStatus::Confirmed,
            OrderEvent::OrderCancelled(data) => self.apply_order_cancelled(data),
        }
    }
}

// Query methods
impl Order {
    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    pub fn product_id(&self) -> Option<AggregateId> {
        self.product_id
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn total_price(&self) -> Money {
        self.total_price
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Reason recorded when the order was cancelled.
    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Returns true if the order is in a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.id.is_some() && self.status.is_terminal()
    }
}

// Command methods (return the event to append)
impl Order {
    /// Creates the order.
    pub fn create(&self, cmd: &CreateOrder) -> Result<OrderEvent, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyExists);
        }
        if cmd.customer_name.trim().is_empty() {
            return Err(OrderError::CustomerNameRequired);
        }
        if cmd.product_name.trim().is_empty() {
            return Err(OrderError::ProductNameRequired);
        }
        if cmd.quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                quantity: cmd.quantity,
            });
        }
        if cmd.total_price.is_negative() {
            return Err(OrderError::InvalidPrice {
                price: cmd.total_price.cents(),
            });
        }

        Ok(OrderEvent::order_created(
            cmd.order_id,
            cmd.customer_name.trim(),
            cmd.product_id,
            cmd.product_name.trim(),
            cmd.quantity,
            cmd.total_price,
        ))
    }

    /// Confirms a pending order.
    pub fn confirm(&self) -> Result<OrderEvent, OrderError> {
        let order_id = self.id.ok_or(OrderError::NotFound)?;
        if !self.status.can_confirm() {
            return Err(OrderError::InvalidStateTransition {
                current_status: self.status,
                action: "confirm",
            });
        }

        Ok(OrderEvent::order_confirmed(order_id))
    }

    /// Cancels a pending order.
    pub fn cancel(&self, reason: impl Into<String>) -> Result<OrderEvent, OrderError> {
        let order_id = self.id.ok_or(OrderError::NotFound)?;
        if !self.status.can_cancel() {
            return Err(OrderError::InvalidStateTransition {
                current_status: self.status,
                action: "cancel",
            });
        }

        Ok(OrderEvent::order_cancelled(order_id, reason))
    }
}

// Apply event helpers
impl Order {
    fn apply_order_created(&mut self, data: OrderCreatedData) {
        self.id = Some(data.order_id);
        self.customer_name = data.customer_name;
        self.product_id = Some(data.product_id);
        self.product_name = data.product_name;
        self.quantity = data.quantity;
        self.total_price = data.total_price;
        self.status = OrderStatus::Pending;
        self.created_at = Some(data.created_at);
    }

    fn apply_order_cancelled(&mut self, data: OrderCancelledData) {
        self.status = OrderStatus::Cancelled;
        self.cancel_reason = Some(data.reason);
    }
}
