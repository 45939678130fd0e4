//! A scripted run through the system: stock two products, place a handful
//! of orders (one of which cannot be filled), then read the analytics.

use common::AggregateId;
use domain::{CreateInventoryItem, InventoryRow, Money, OrderRow};
use event_store::{EventStore, ReadModelStore};
use projections::SalesOverview;
use saga::{PlaceOrder, SagaOutcome};
use serde::Serialize;

use crate::Result;
use crate::system::FulfillmentSystem;

/// What the demo did and what marketing saw afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    pub outcomes: Vec<SagaOutcome>,
    pub products: Vec<InventoryRow>,
    pub overview: SalesOverview,
}

impl DemoReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }
}

pub async fn run_demo<OS, IS>(system: &FulfillmentSystem<OS, IS>) -> Result<DemoReport>
where
    OS: EventStore + ReadModelStore<Row = OrderRow>,
    IS: EventStore + ReadModelStore<Row = InventoryRow>,
{
    let keyboard = AggregateId::new();
    let hub = AggregateId::new();
    for item in [
        CreateInventoryItem::new(keyboard, "Mechanical Keyboard", 50, Money::from_cents(8999)),
        CreateInventoryItem::new(hub, "USB-C Hub", 5, Money::from_cents(3450)),
    ] {
        system.inventory().create_item(item).await?;
    }

    let requests = [
        PlaceOrder::new("Ada Lovelace", keyboard, 3),
        PlaceOrder::new("Grace Hopper", hub, 4),
        // Only one hub left: this one is compensated.
        PlaceOrder::new("Linus Torvalds", hub, 5),
        PlaceOrder::new("Ada Lovelace", hub, 1),
    ];

    let mut outcomes = Vec::with_capacity(requests.len());
    for request in requests {
        let customer = request.customer_name.clone();
        let outcome = system.saga().place_order(request).await?;
        tracing::info!(
            %customer,
            order_id = %outcome.order_id,
            success = outcome.success,
            steps = outcome.saga_log.len(),
            "order placed"
        );
        outcomes.push(outcome);
    }

    // The subscriber is asynchronous; a backfill makes the read deterministic.
    system.backfill().await?;

    Ok(DemoReport {
        outcomes,
        products: system.inventory().list_products().await?,
        overview: system.analytics().overview().await,
    })
}
