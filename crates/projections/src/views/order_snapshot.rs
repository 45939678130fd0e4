//! Order snapshot view: one denormalized row per order for marketing queries.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::AggregateId;
use domain::{Money, OrderEvent, OrderStatus};
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use super::{decode_order_event, missing_predecessor};
use crate::Result;
use crate::ledger::AppliedLedger;
use crate::projection::{Applied, Projection, ProjectionPosition};

/// Marketing's copy of an order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderSnapshot {
    pub order_id: AggregateId,
    pub customer_name: String,
    pub product_id: AggregateId,
    pub product_name: String,
    pub quantity: u32,
    pub total_price: Money,
    pub status: OrderStatus,
    pub order_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct OrderSnapshotState {
    orders: HashMap<AggregateId, OrderSnapshot>,
    ledger: AppliedLedger,
    position: ProjectionPosition,
}

/// Read model view holding an [`OrderSnapshot`] per order.
#[derive(Clone, Default)]
pub struct OrderSnapshotView {
    state: Arc<RwLock<OrderSnapshotState>>,
}

impl OrderSnapshotView {
    pub const NAME: &'static str = "OrderSnapshotView";

    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the snapshot of a specific order.
    pub async fn get(&self, order_id: AggregateId) -> Option<OrderSnapshot> {
        self.state.read().await.orders.get(&order_id).cloned()
    }

    /// Gets all snapshots, newest first.
    pub async fn list(&self) -> Vec<OrderSnapshot> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state.orders.values().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }

    pub async fn count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl Projection for OrderSnapshotView {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<Applied> {
        let Some(order_event) = decode_order_event(event)? else {
            return Ok(Applied::Ignored);
        };

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        if state.ledger.contains(event) {
            return Ok(Applied::Duplicate);
        }

        let order_id = event.aggregate_id;
        match order_event {
            OrderEvent::OrderCreated(data) => {
                state.orders.entry(order_id).or_insert(OrderSnapshot {
                    order_id,
                    customer_name: data.customer_name,
                    product_id: data.product_id,
                    product_name: data.product_name,
                    quantity: data.quantity,
                    total_price: data.total_price,
                    status: OrderStatus::Pending,
                    order_date: data.created_at.date_naive(),
                    created_at: data.created_at,
                    updated_at: data.created_at,
                });
            }
            OrderEvent::OrderConfirmed(data) => {
                let snapshot = state
                    .orders
                    .get_mut(&order_id)
                    .ok_or_else(|| missing_predecessor(Self::NAME, order_id, event))?;
                snapshot.status = OrderStatus::Confirmed;
                snapshot.updated_at = data.confirmed_at;
            }
            OrderEvent::OrderCancelled(data) => {
                let snapshot = state
                    .orders
                    .get_mut(&order_id)
                    .ok_or_else(|| missing_predecessor(Self::NAME, order_id, event))?;
                snapshot.status = OrderStatus::Cancelled;
                snapshot.updated_at = data.cancelled_at;
            }
        }

        state.ledger.record(event);
        state.position.record(event);
        Ok(Applied::Changed)
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = OrderSnapshotState::default();
        Ok(())
    }
}
