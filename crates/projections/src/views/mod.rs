//! Analytics views fed by published order events.

pub mod customer_summary;
pub mod daily_sales;
pub mod order_snapshot;
pub mod product_popularity;

pub use customer_summary::{CustomerSummary, CustomerSummaryView};
pub use daily_sales::{DailySales, DailySalesView};
pub use order_snapshot::{OrderSnapshot, OrderSnapshotView};
pub use product_popularity::{ProductPopularity, ProductPopularityView};

use common::{AggregateId, AggregateKind};
use domain::OrderEvent;
use event_store::EventEnvelope;

use crate::{ProjectionError, Result};

/// Decodes an order event; `None` for events of other aggregates.
pub(crate) fn decode_order_event(envelope: &EventEnvelope) -> Result<Option<OrderEvent>> {
    if AggregateKind::parse(&envelope.aggregate_type) != Some(AggregateKind::Order) {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(envelope.payload.clone())?))
}

pub(crate) fn missing_predecessor(
    projection: &'static str,
    aggregate_id: AggregateId,
    envelope: &EventEnvelope,
) -> ProjectionError {
    ProjectionError::MissingPredecessor {
        projection,
        aggregate_id,
        event_type: envelope.event_type.clone(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use chrono::{DateTime, TimeZone, Utc};
    use common::AggregateId;
    use domain::order::OrderCreatedData;
    use domain::{DomainEvent, Money, OrderEvent};
    use event_store::{EventEnvelope, NewEvent, Version};

    pub fn envelope(order_id: AggregateId, version: i64, event: &OrderEvent) -> EventEnvelope {
        NewEvent::from_payload(order_id, "Order", event.event_type(), event)
            .unwrap()
            .into_envelope(Version::new(version))
    }

    pub fn created_at(
        order_id: AggregateId,
        customer: &str,
        product_id: AggregateId,
        quantity: u32,
        cents: i64,
        at: DateTime<Utc>,
    ) -> EventEnvelope {
        let event = OrderEvent::OrderCreated(OrderCreatedData {
            order_id,
            customer_name: customer.to_string(),
            product_id,
            product_name: "Widget".to_string(),
            quantity,
            total_price: Money::from_cents(cents),
            created_at: at,
        });
        envelope(order_id, 1, &event)
    }

    pub fn created(
        order_id: AggregateId,
        customer: &str,
        product_id: AggregateId,
        quantity: u32,
        cents: i64,
    ) -> EventEnvelope {
        created_at(order_id, customer, product_id, quantity, cents, day(1))
    }

    pub fn confirmed(order_id: AggregateId) -> EventEnvelope {
        envelope(order_id, 2, &OrderEvent::order_confirmed(order_id))
    }

    pub fn cancelled(order_id: AggregateId) -> EventEnvelope {
        envelope(
            order_id,
            2,
            &OrderEvent::order_cancelled(order_id, "Insufficient inventory"),
        )
    }

    /// Noon UTC on the given day of March 2026.
    pub fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, d, 12, 0, 0).unwrap()
    }
}
