//! Denormalized product rows maintained alongside the inventory log.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::{EventEnvelope, EventStoreError, RowProjector};
use serde::{Deserialize, Serialize};

use crate::money::Money;

use super::InventoryEvent;

/// Current stock of one product, queryable without replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRow {
    pub id: AggregateId,
    pub name: String,
    pub quantity: u32,
    pub reserved: u32,
    pub available: u32,
    pub price: Money,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl InventoryRow {
    fn restamp(mut self, quantity: u32, reserved: u32, envelope: &EventEnvelope) -> Self {
        self.quantity = quantity;
        self.reserved = reserved;
        self.available = quantity.saturating_sub(reserved);
        self.version = envelope.version.as_i64();
        self.updated_at = envelope.created_at;
        self
    }
}

/// Folds inventory events into [`InventoryRow`]s inside the append transaction.
pub struct InventoryRowProjector;

impl RowProjector for InventoryRowProjector {
    type Row = InventoryRow;

    fn model() -> &'static str {
        "inventory"
    }

    fn project(
        current: Option<InventoryRow>,
        envelope: &EventEnvelope,
    ) -> event_store::Result<Option<InventoryRow>> {
        let event: InventoryEvent = serde_json::from_value(envelope.payload.clone())?;

        let row = match (current, event) {
            (_, InventoryEvent::InventoryItemCreated(data)) => InventoryRow {
                id: data.product_id,
                name: data.name,
                quantity: data.quantity,
                reserved: 0,
                available: data.quantity,
                price: data.price,
                version: envelope.version.as_i64(),
                updated_at: envelope.created_at,
            },
            (Some(row), InventoryEvent::InventoryRestocked(data)) => {
                let (quantity, reserved) =
                    (row.quantity.saturating_add(data.quantity), row.reserved);
                row.restamp(quantity, reserved, envelope)
            }
            (Some(row), InventoryEvent::InventoryReserved(data)) => {
                let (quantity, reserved) = (row.quantity, row.reserved + data.quantity);
                row.restamp(quantity, reserved, envelope)
            }
            (Some(row), InventoryEvent::InventoryReleased(data)) => {
                let (quantity, reserved) =
                    (row.quantity, row.reserved.saturating_sub(data.quantity));
                row.restamp(quantity, reserved, envelope)
            }
            (None, _) => {
                return Err(EventStoreError::ReadModel {
                    model: Self::model(),
                    event_type: envelope.event_type.clone(),
                    reason: format!("no row for product {}", envelope.aggregate_id),
                });
            }
        };

        Ok(Some(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DomainEvent;
    use event_store::{NewEvent, Version};

    fn envelope(product_id: AggregateId, version: i64, event: &InventoryEvent) -> EventEnvelope {
        NewEvent::from_payload(product_id, "Inventory", event.event_type(), event)
            .unwrap()
            .into_envelope(Version::new(version))
    }

    #[test]
    fn test_tracks_available_through_reserve_and_release() {
        let product_id = AggregateId::new();
        let order_id = AggregateId::new();

        let created = InventoryEvent::item_created(product_id, "Widget", 50, Money::from_cents(999));
        let row = InventoryRowProjector::project(None, &envelope(product_id, 1, &created))
            .unwrap()
            .unwrap();
        assert_eq!(row.available, 50);

        let reserved = InventoryEvent::reserved(product_id, order_id, 3);
        let row = InventoryRowProjector::project(Some(row), &envelope(product_id, 2, &reserved))
            .unwrap()
            .unwrap();
        assert_eq!((row.quantity, row.reserved, row.available), (50, 3, 47));

        let released = InventoryEvent::released(product_id, order_id, 3);
        let row = InventoryRowProjector::project(Some(row), &envelope(product_id, 3, &released))
            .unwrap()
            .unwrap();
        assert_eq!((row.quantity, row.reserved, row.available), (50, 0, 50));
        assert_eq!(row.version, 3);
    }

    #[test]
    fn test_malformed_payload_is_rejected() {
        let product_id = AggregateId::new();
        let bad = NewEvent::new(
            product_id,
            "Inventory",
            "InventoryReserved",
            serde_json::json!({"type": "Nope"}),
        )
        .into_envelope(Version::first());

        assert!(matches!(
            InventoryRowProjector::project(None, &bad),
            Err(EventStoreError::Serialization(_))
        ));
    }
}
