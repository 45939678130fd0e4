//! Daily sales view: order counts and revenue per calendar day (UTC).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use common::AggregateId;
use domain::{Money, OrderEvent};
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use super::{decode_order_event, missing_predecessor};
use crate::Result;
use crate::ledger::AppliedLedger;
use crate::projection::{Applied, Projection, ProjectionPosition};

/// Sales for one day, attributed to the day the order was placed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySales {
    pub sale_date: NaiveDate,
    pub total_orders: u64,
    pub confirmed_orders: u64,
    pub cancelled_orders: u64,
    pub total_revenue: Money,
    pub avg_order_value: Money,
}

impl DailySales {
    fn new(sale_date: NaiveDate) -> Self {
        Self {
            sale_date,
            total_orders: 0,
            confirmed_orders: 0,
            cancelled_orders: 0,
            total_revenue: Money::zero(),
            avg_order_value: Money::zero(),
        }
    }
}

#[derive(Default)]
struct DailySalesState {
    days: BTreeMap<NaiveDate, DailySales>,
    order_dates: HashMap<AggregateId, NaiveDate>,
    ledger: AppliedLedger,
    position: ProjectionPosition,
}

/// Read model view of sales per day.
#[derive(Clone, Default)]
pub struct DailySalesView {
    state: Arc<RwLock<DailySalesState>>,
}

impl DailySalesView {
    pub const NAME: &'static str = "DailySalesView";

    /// Number of days returned by [`DailySalesView::list`].
    pub const DEFAULT_LIMIT: usize = 30;

    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, sale_date: NaiveDate) -> Option<DailySales> {
        self.state.read().await.days.get(&sale_date).cloned()
    }

    /// The most recent `limit` days, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<DailySales> {
        self.state
            .read()
            .await
            .days
            .values()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn list(&self) -> Vec<DailySales> {
        self.recent(Self::DEFAULT_LIMIT).await
    }
}

#[async_trait]
impl Projection for DailySalesView {
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
                let sale_date = data.created_at.date_naive();
                state.order_dates.insert(order_id, sale_date);

                let day = state
                    .days
                    .entry(sale_date)
                    .or_insert_with(|| DailySales::new(sale_date));
                day.total_orders += 1;
                day.total_revenue += data.total_price;
                day.avg_order_value = day.total_revenue.average_over(day.total_orders);
            }
            OrderEvent::OrderConfirmed(_) | OrderEvent::OrderCancelled(_) => {
                let day = state
                    .order_dates
                    .get(&order_id)
                    .and_then(|date| state.days.get_mut(date))
                    .ok_or_else(|| missing_predecessor(Self::NAME, order_id, event))?;
                if matches!(order_event, OrderEvent::OrderConfirmed(_)) {
                    day.confirmed_orders += 1;
                } else {
                    day.cancelled_orders += 1;
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
        *self.state.write().await = DailySalesState::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::testing::{cancelled, confirmed, created_at, day};
    use chrono::Duration;

    #[tokio::test]
    async fn test_status_changes_count_on_the_order_day() {
        let view = DailySalesView::new();
        let product_id = AggregateId::new();
        let order_id = AggregateId::new();
        let other = AggregateId::new();

        view.handle(&created_at(order_id, "Ada", product_id, 1, 1000, day(2)))
            .await
            .unwrap();
        view.handle(&created_at(other, "Bob", product_id, 1, 3000, day(2)))
            .await
            .unwrap();
        view.handle(&confirmed(order_id)).await.unwrap();
        view.handle(&cancelled(other)).await.unwrap();

        let sales = view.get(day(2).date_naive()).await.unwrap();
        assert_eq!(sales.total_orders, 2);
        assert_eq!(sales.confirmed_orders, 1);
        assert_eq!(sales.cancelled_orders, 1);
        assert_eq!(sales.total_revenue, Money::from_cents(4000));
        assert_eq!(sales.avg_order_value, Money::from_cents(2000));
    }

    #[tokio::test]
    async fn test_midnight_boundary_uses_utc_date() {
        let view = DailySalesView::new();
        let late = day(4) + Duration::hours(11) + Duration::minutes(59);

        view.handle(&created_at(AggregateId::new(), "Ada", AggregateId::new(), 1, 100, late))
            .await
            .unwrap();

        assert!(view.get(day(4).date_naive()).await.is_some());
        assert!(view.get(day(5).date_naive()).await.is_none());
    }

    #[tokio::test]
    async fn test_recent_is_newest_first_and_limited() {
        let view = DailySalesView::new();
        for d in 1..=5 {
            view.handle(&created_at(
                AggregateId::new(),
                "Ada",
                AggregateId::new(),
                1,
                100,
                day(d),
            ))
            .await
            .unwrap();
        }

        let dates: Vec<_> = view
            .recent(3)
            .await
            .into_iter()
            .map(|s| s.sale_date)
            .collect();
        assert_eq!(
            dates,
            vec![
                day(5).date_naive(),
                day(4).date_naive(),
                day(3).date_naive()
            ]
        );
        assert_eq!(view.list().await.len(), 5);
    }
}
