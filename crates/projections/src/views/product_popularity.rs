//! Product popularity view: units, orders, revenue and reach per product.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::{Money, OrderEvent};
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use super::{decode_order_event, missing_predecessor};
use crate::Result;
use crate::ledger::AppliedLedger;
use crate::projection::{Applied, Projection, ProjectionPosition};

/// Per-product order statistics.
///
/// Cancellations do not subtract anything: totals describe demand, the
/// `confirmed_*` counters describe what actually shipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductPopularity {
    pub product_id: AggregateId,
    pub product_name: String,
    pub total_units_ordered: u64,
    pub confirmed_units: u64,
    pub total_order_count: u64,
    pub confirmed_order_count: u64,
    pub total_revenue: Money,
    pub unique_customers: u64,
}

#[derive(Default)]
struct ProductPopularityState {
    products: HashMap<AggregateId, ProductPopularity>,
    /// (product, customer) pairs already counted in `unique_customers`.
    buyers: HashSet<(AggregateId, String)>,
    /// order id -> (product id, quantity), learned from `OrderCreated`.
    order_lines: HashMap<AggregateId, (AggregateId, u32)>,
    ledger: AppliedLedger,
    position: ProjectionPosition,
}

/// Read model view ranking products by demand.
#[derive(Clone, Default)]
pub struct ProductPopularityView {
    state: Arc<RwLock<ProductPopularityState>>,
}

impl ProductPopularityView {
    pub const NAME: &'static str = "ProductPopularityView";

    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, product_id: AggregateId) -> Option<ProductPopularity> {
        self.state.read().await.products.get(&product_id).cloned()
    }

    /// Gets all products, highest revenue first.
    pub async fn list(&self) -> Vec<ProductPopularity> {
        let state = self.state.read().await;
        let mut products: Vec<_> = state.products.values().cloned().collect();
        products.sort_by(|a, b| {
            b.total_revenue
                .cmp(&a.total_revenue)
                .then_with(|| a.product_name.cmp(&b.product_name))
        });
        products
    }
}

#[async_trait]
impl Projection for ProductPopularityView {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<Applied> {
        let Some(order_event) = decode_order_event(event)? else {
            return Ok(Applied::Ignored);
        };
        if matches!(order_event, OrderEvent::OrderCancelled(_)) {
            return Ok(Applied::Ignored);
        }

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        if state.ledger.contains(event) {
            return Ok(Applied::Duplicate);
        }

        let order_id = event.aggregate_id;
        match order_event {
            OrderEvent::OrderCreated(data) => {
                state
                    .order_lines
                    .insert(order_id, (data.product_id, data.quantity));

                let product = state
                    .products
                    .entry(data.product_id)
                    .or_insert_with(|| ProductPopularity {
                        product_id: data.product_id,
                        product_name: data.product_name.clone(),
                        total_units_ordered: 0,
                        confirmed_units: 0,
                        total_order_count: 0,
                        confirmed_order_count: 0,
                        total_revenue: Money::zero(),
                        unique_customers: 0,
                    });
                product.total_units_ordered += u64::from(data.quantity);
                product.total_order_count += 1;
                product.total_revenue += data.total_price;
                if state.buyers.insert((data.product_id, data.customer_name)) {
                    product.unique_customers += 1;
                }
            }
            OrderEvent::OrderConfirmed(_) => {
                let (product_id, quantity) = state
                    .order_lines
                    .get(&order_id)
                    .copied()
                    .ok_or_else(|| missing_predecessor(Self::NAME, order_id, event))?;
                let product = state
                    .products
                    .get_mut(&product_id)
                    .ok_or_else(|| missing_predecessor(Self::NAME, order_id, event))?;
                product.confirmed_units += u64::from(quantity);
                product.confirmed_order_count += 1;
            }
            OrderEvent::OrderCancelled(_) => return Ok(Applied::Ignored),
        }

        state.ledger.record(event);
        state.position.record(event);
        Ok(Applied::Changed)
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = ProductPopularityState::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::testing::{cancelled, confirmed, created};

    #[tokio::test]
    async fn test_demand_and_confirmed_counters() {
        let view = ProductPopularityView::new();
        let product_id = AggregateId::new();
        let first = AggregateId::new();
        let second = AggregateId::new();

        view.handle(&created(first, "Ada", product_id, 3, 3000))
            .await
            .unwrap();
        view.handle(&created(second, "Ada", product_id, 2, 2000))
            .await
            .unwrap();
        view.handle(&confirmed(first)).await.unwrap();

        let product = view.get(product_id).await.unwrap();
        assert_eq!(product.total_units_ordered, 5);
        assert_eq!(product.total_order_count, 2);
        assert_eq!(product.confirmed_units, 3);
        assert_eq!(product.confirmed_order_count, 1);
        assert_eq!(product.total_revenue, Money::from_cents(5000));
        assert_eq!(product.unique_customers, 1);
    }

    #[tokio::test]
    async fn test_cancellation_leaves_popularity_untouched() {
        let view = ProductPopularityView::new();
        let product_id = AggregateId::new();
        let order_id = AggregateId::new();
        view.handle(&created(order_id, "Ada", product_id, 4, 400))
            .await
            .unwrap();
        let before = view.get(product_id).await.unwrap();

        assert_eq!(
            view.handle(&cancelled(order_id)).await.unwrap(),
            Applied::Ignored
        );

        assert_eq!(view.get(product_id).await.unwrap(), before);
        assert_eq!(view.position().await.applied, 1);
    }

    #[tokio::test]
    async fn test_unique_customers_survive_redelivery() {
        let view = ProductPopularityView::new();
        let product_id = AggregateId::new();
        let ada = created(AggregateId::new(), "Ada", product_id, 1, 100);
        let grace = created(AggregateId::new(), "Grace", product_id, 1, 100);

        for event in [&ada, &grace, &ada, &grace] {
            view.handle(event).await.unwrap();
        }

        let product = view.get(product_id).await.unwrap();
        assert_eq!(product.unique_customers, 2);
        assert_eq!(product.total_order_count, 2);
    }

    #[tokio::test]
    async fn test_list_sorted_by_revenue() {
        let view = ProductPopularityView::new();
        let cheap = AggregateId::new();
        let pricey = AggregateId::new();
        view.handle(&created(AggregateId::new(), "Ada", cheap, 10, 1000))
            .await
            .unwrap();
        view.handle(&created(AggregateId::new(), "Ada", pricey, 1, 5000))
            .await
            .unwrap();

        let ids: Vec<_> = view.list().await.into_iter().map(|p| p.product_id).collect();
        assert_eq!(ids, vec![pricey, cheap]);
    }
}
