//! Denormalized order rows maintained alongside the order log.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::{EventEnvelope, EventStoreError, RowProjector};
use serde::{Deserialize, Serialize};

use crate::money::Money;

use super::{OrderEvent, OrderStatus};

/// Current state of one order, queryable without replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRow {
    pub id: AggregateId,
    pub customer_name: String,
    pub product_id: AggregateId,
    pub product_name: String,
    pub quantity: u32,
    pub total_price: Money,
    pub status: OrderStatus,
    pub cancel_reason: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Folds order events into [`OrderRow`]s inside the append transaction.
pub struct OrderRowProjector;

impl RowProjector for OrderRowProjector {
    type Row = OrderRow;

    fn model() -> &'static str {
        "orders"
    }

    fn project(
        current: Option<OrderRow>,
        envelope: &EventEnvelope,
    ) -> event_store::Result<Option<OrderRow>> {
        let event: OrderEvent = serde_json::from_value(envelope.payload.clone())?;

        let row = match (current, event) {
            (_, OrderEvent::OrderCreated(data)) => OrderRow {
                id: data.order_id,
                customer_name: data.customer_name,
                product_id: data.product_id,
                product_name: data.product_name,
                quantity: data.quantity,
                total_price: data.total_price,
                status: OrderStatus::Pending,
                cancel_reason: None,
                version: envelope.version.as_i64(),
                created_at: envelope.created_at,
                updated_at: envelope.created_at,
            },
            (Some(row), OrderEvent::OrderConfirmed(_)) => OrderRow {
                status: OrderStatus::Confirmed,
                version: envelope.version.as_i64(),
                updated_at: envelope.created_at,
                ..row
            },
            (Some(row), OrderEvent::OrderCancelled(data)) => OrderRow {
                status: OrderStatus::Cancelled,
                cancel_reason: Some(data.reason),
                version: envelope.version.as_i64(),
                updated_at: envelope.created_at,
                ..row
            },
            (None, _) => {
                return Err(EventStoreError::ReadModel {
                    model: Self::model(),
                    event_type: envelope.event_type.clone(),
                    reason: format!("no row for order {}", envelope.aggregate_id),
                });
            }
        };

        Ok(Some(row))
    }
}
