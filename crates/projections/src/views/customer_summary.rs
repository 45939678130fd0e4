//! Customer summary view: per-customer order counts and revenue.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{Money, OrderEvent};
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use super::{decode_order_event, missing_predecessor};
use crate::Result;
use crate::ledger::AppliedLedger;
use crate::projection::{Applied, Projection, ProjectionPosition};

/// Per-customer order statistics, keyed by customer name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerSummary {
    pub customer_name: String,
    pub total_orders: u64,
    pub confirmed_orders: u64,
    pub cancelled_orders: u64,
    /// Sum of every placed order's total, cancelled ones included.
    pub total_revenue: Money,
    pub avg_order_value: Money,
    pub first_order_at: DateTime<Utc>,
    pub last_order_at: DateTime<Utc>,
}

impl CustomerSummary {
    fn new(customer_name: String, at: DateTime<Utc>) -> Self {
        Self {
            customer_name,
            total_orders: 0,
            confirmed_orders: 0,
            cancelled_orders: 0,
            total_revenue: Money::zero(),
            avg_order_value: Money::zero(),
            first_order_at: at,
            last_order_at: at,
        }
    }
}

#[derive(Default)]
struct CustomerSummaryState {
    customers: HashMap<String, CustomerSummary>,
    /// order id -> customer name, learned from `OrderCreated`.
    order_customers: HashMap<AggregateId, String>,
    ledger: AppliedLedger,
    position: ProjectionPosition,
}

/// Read model view for per-customer order statistics.
#[derive(Clone, Default)]
pub struct CustomerSummaryView {
    state: Arc<RwLock<CustomerSummaryState>>,
}

impl CustomerSummaryView {
    pub const NAME: &'static str = "CustomerSummaryView";

    pub fn new() -> Self {
        Self::default()
    }

    /// Gets statistics for a specific customer.
    pub async fn get(&self, customer_name: &str) -> Option<CustomerSummary> {
        self.state.read().await.customers.get(customer_name).cloned()
    }

    /// Gets all customers, highest revenue first.
    pub async fn list(&self) -> Vec<CustomerSummary> {
        let state = self.state.read().await;
        let mut customers: Vec<_> = state.customers.values().cloned().collect();
        customers.sort_by(|a, b| {
            b.total_revenue
                .cmp(&a.total_revenue)
                .then_with(|| a.customer_name.cmp(&b.customer_name))
        });
        customers
    }
}

#[async_trait]
impl Projection for CustomerSummaryView {
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
                state
                    .order_customers
                    .insert(order_id, data.customer_name.clone());

                let at = data.created_at;
                let customer = state
                    .customers
                    .entry(data.customer_name.clone())
                    .or_insert_with(|| CustomerSummary::new(data.customer_name, at));
                customer.total_orders += 1;
                customer.total_revenue += data.total_price;
                customer.avg_order_value =
                    customer.total_revenue.average_over(customer.total_orders);
                customer.first_order_at = customer.first_order_at.min(at);
                customer.last_order_at = customer.last_order_at.max(at);
            }
            OrderEvent::OrderConfirmed(_) | OrderEvent::OrderCancelled(_) => {
                let customer = state
                    .order_customers
                    .get(&order_id)
                    .and_then(|name| state.customers.get_mut(name))
                    .ok_or_else(|| missing_predecessor(Self::NAME, order_id, event))?;
                if matches!(order_event, OrderEvent::OrderConfirmed(_)) {
                    customer.confirmed_orders += 1;
                } else {
                    customer.cancelled_orders += 1;
                }
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
        *self.state.write().await = CustomerSummaryState::default();
        Ok(())
    }
}
