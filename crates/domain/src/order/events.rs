//! Order domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::money::Money;

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was created in `PENDING`.
    OrderCreated(OrderCreatedData),

    /// Order was confirmed after a successful reservation.
    OrderConfirmed(OrderConfirmedData),

    /// Order was cancelled.
    OrderCancelled(OrderCancelledData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated(_) => "OrderCreated",
            OrderEvent::OrderConfirmed(_) => "OrderConfirmed",
            OrderEvent::OrderCancelled(_) => "OrderCancelled",
        }
    }
}

/// Data for OrderCreated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreatedData {
    pub order_id: AggregateId,
    pub customer_name: String,
    /// The inventory item being ordered.
    pub product_id: AggregateId,
    pub product_name: String,
    pub quantity: u32,
    pub total_price: Money,
    pub created_at: DateTime<Utc>,
}

/// Data for OrderConfirmed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderConfirmedData {
    pub order_id: AggregateId,
    pub confirmed_at: DateTime<Utc>,
}

/// Data for OrderCancelled event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelledData {
    pub order_id: AggregateId,
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
}

// Convenience constructors for events
impl OrderEvent {
    /// Creates an OrderCreated event.
    pub fn order_created(
        order_id: AggregateId,
        customer_name: impl Into<String>,
        product_id: AggregateId,
        product_name: impl Into<String>,
        quantity: u32,
        total_price: Money,
    ) -> Self {
        OrderEvent::OrderCreated(OrderCreatedData {
            order_id,
            customer_name: customer_name.into(),
            product_id,
            product_name: product_name.into(),
            quantity,
            total_price,
            created_at: Utc::now(),
        })
    }

    /// Creates an OrderConfirmed event.
    pub fn order_confirmed(order_id: AggregateId) -> Self {
        OrderEvent::OrderConfirmed(OrderConfirmedData {
            order_id,
            confirmed_at: Utc::now(),
        })
    }

    /// Creates an OrderCancelled event.
    pub fn order_cancelled(order_id: AggregateId, reason: impl Into<String>) -> Self {
        OrderEvent::OrderCancelled(OrderCancelledData {
            order_id,
            reason: reason.into(),
            cancelled_at: Utc::now(),
        })
    }

    /// The order this event belongs to.
    pub fn order_id(&self) -> AggregateId {
        match self {
            OrderEvent::OrderCreated(data) => data.order_id,
            OrderEvent::OrderConfirmed(data) => data.order_id,
            OrderEvent::OrderCancelled(data) => data.order_id,
        }
    }
}
