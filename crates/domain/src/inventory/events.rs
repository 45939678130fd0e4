//! Inventory domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::money::Money;

/// Events that can occur on an inventory item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum InventoryEvent {
    /// Item was stocked for the first time.
    InventoryItemCreated(InventoryItemCreatedData),

    /// Units were added to the on-hand quantity.
    InventoryRestocked(InventoryRestockedData),

    /// Units were reserved for an order.
    InventoryReserved(InventoryReservedData),

    /// A reservation was given back.
    InventoryReleased(InventoryReleasedData),
}

impl DomainEvent for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::InventoryItemCreated(_) => "InventoryItemCreated",
            InventoryEvent::InventoryRestocked(_) => "InventoryRestocked",
            InventoryEvent::InventoryReserved(_) => "InventoryReserved",
            InventoryEvent::InventoryReleased(_) => "InventoryReleased",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItemCreatedData {
    pub product_id: AggregateId,
    pub name: String,
    pub quantity: u32,
    /// Unit price.
    pub price: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRestockedData {
    pub product_id: AggregateId,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryReservedData {
    pub product_id: AggregateId,
    pub order_id: AggregateId,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryReleasedData {
    pub product_id: AggregateId,
    pub order_id: AggregateId,
    pub quantity: u32,
}

impl InventoryEvent {
    pub fn item_created(
        product_id: AggregateId,
        name: impl Into<String>,
        quantity: u32,
        price: Money,
    ) -> Self {
        InventoryEvent::InventoryItemCreated(InventoryItemCreatedData {
            product_id,
            name: name.into(),
            quantity,
            price,
            created_at: Utc::now(),
        })
    }

    pub fn restocked(product_id: AggregateId, quantity: u32) -> Self {
        InventoryEvent::InventoryRestocked(InventoryRestockedData {
            product_id,
            quantity,
        })
    }

    pub fn reserved(product_id: AggregateId, order_id: AggregateId, quantity: u32) -> Self {
        InventoryEvent::InventoryReserved(InventoryReservedData {
            product_id,
            order_id,
            quantity,
        })
    }

    pub fn released(product_id: AggregateId, order_id: AggregateId, quantity: u32) -> Self {
        InventoryEvent::InventoryReleased(InventoryReleasedData {
            product_id,
            order_id,
            quantity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_payload_round_trips_through_tagged_json() {
        let event = InventoryEvent::reserved(AggregateId::new(), AggregateId::new(), 3);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "InventoryReserved");
        assert_eq!(json["data"]["quantity"], 3);

        let parsed: InventoryEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
        assert_eq!(parsed.event_type(), "InventoryReserved");
    }
}
