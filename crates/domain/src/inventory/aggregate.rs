//! Inventory item aggregate implementation.

use common::{AggregateId, AggregateKind};
use event_store::Version;

use crate::aggregate::Aggregate;
use crate::money::Money;

use super::{
    CreateInventoryItem, InventoryError, InventoryEvent, events::InventoryItemCreatedData,
};

/// Stock of one product.
///
/// Invariant: `reserved <= quantity`, so `available` never goes negative.
/// Every command that could break it is rejected before an event exists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryItem {
    id: Option<AggregateId>,
    version: Version,
    name: String,
    quantity: u32,
    reserved: u32,
    price: Money,
}

impl Aggregate for InventoryItem {
    type Event = InventoryEvent;
    type Error = InventoryError;

    fn aggregate_type() -> &'static str {
        AggregateKind::Inventory.as_str()
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            InventoryEvent::InventoryItemCreated(data) => self.apply_item_created(data),
            InventoryEvent::InventoryRestocked(data) => {
                self.quantity = self.quantity.saturating_add(data.quantity)
            }
            InventoryEvent::InventoryReserved(data) => self.reserved += data.quantity,
            InventoryEvent::InventoryReleased(data) => {
                self.reserved = self.reserved.saturating_sub(data.quantity)
            }
        }
    }
}

// Query methods
impl InventoryItem {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Units on hand, reserved or not.
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn reserved(&self) -> u32 {
        self.reserved
    }

    /// Units that can still be reserved.
    pub fn available(&self) -> u32 {
        self.quantity - self.reserved
    }

    /// Unit price.
    pub fn price(&self) -> Money {
        self.price
    }
}

// Command methods (return the event to append)
impl InventoryItem {
    pub fn create(&self, cmd: &CreateInventoryItem) -> Result<InventoryEvent, InventoryError> {
        if self.id.is_some() {
            return Err(InventoryError::AlreadyExists);
        }
        if cmd.name.trim().is_empty() {
            return Err(InventoryError::NameRequired);
        }
        if cmd.price.is_negative() {
            return Err(InventoryError::InvalidPrice {
                price: cmd.price.cents(),
            });
        }

        Ok(InventoryEvent::item_created(
            cmd.product_id,
            cmd.name.trim(),
            cmd.quantity,
            cmd.price,
        ))
    }

    pub fn restock(&self, quantity: u32) -> Result<InventoryEvent, InventoryError> {
        let product_id = self.id.ok_or(InventoryError::NotFound)?;
        ensure_positive(quantity)?;
        if self.quantity.checked_add(quantity).is_none() {
            return Err(InventoryError::QuantityOverflow {
                on_hand: self.quantity,
                requested: quantity,
            });
        }

        Ok(InventoryEvent::restocked(product_id, quantity))
    }

    /// Reserves units for an order.
    pub fn reserve(
        &self,
        order_id: AggregateId,
        quantity: u32,
    ) -> Result<InventoryEvent, InventoryError> {
        let product_id = self.id.ok_or(InventoryError::NotFound)?;
        ensure_positive(quantity)?;

        let available = self.available();
        if quantity > available {
            return Err(InventoryError::InsufficientInventory {
                requested: quantity,
                available,
            });
        }

        Ok(InventoryEvent::reserved(product_id, order_id, quantity))
    }

    /// Gives reserved units back, compensating an earlier reservation.
    pub fn release(
        &self,
        order_id: AggregateId,
        quantity: u32,
    ) -> Result<InventoryEvent, InventoryError> {
        let product_id = self.id.ok_or(InventoryError::NotFound)?;
        ensure_positive(quantity)?;

        if quantity > self.reserved {
            return Err(InventoryError::ReleaseExceedsReserved {
                requested: quantity,
                reserved: self.reserved,
            });
        }

        Ok(InventoryEvent::released(product_id, order_id, quantity))
    }
}

fn ensure_positive(quantity: u32) -> Result<(), InventoryError> {
    if quantity == 0 {
        return Err(InventoryError::InvalidQuantity { quantity });
    }
    Ok(())
}

// Apply event helpers
impl InventoryItem {
    fn apply_item_created(&mut self, data: InventoryItemCreatedData) {
        self.id = Some(data.product_id);
        self.name = data.name;
        self.quantity = data.quantity;
        self.reserved = 0;
        self.price = data.price;
    }
}
