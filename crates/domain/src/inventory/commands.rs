//! Inventory commands.

use common::AggregateId;

use crate::command::Command;
use crate::money::Money;

use super::InventoryItem;

/// Command to stock a new product.
#[derive(Debug, Clone)]
pub struct CreateInventoryItem {
    pub product_id: AggregateId,
    pub name: String,
    pub quantity: u32,
    /// Unit price.
    pub price: Money,
}

impl CreateInventoryItem {
    pub fn new(
        product_id: AggregateId,
        name: impl Into<String>,
        quantity: u32,
        price: Money,
    ) -> Self {
        Self {
            product_id,
            name: name.into(),
            quantity,
            price,
        }
    }
}

impl Command for CreateInventoryItem {
    type Aggregate = InventoryItem;

    fn aggregate_id(&self) -> AggregateId {
        self.product_id
    }
}

/// Command to add units to an existing product.
#[derive(Debug, Clone)]
pub struct RestockInventory {
    pub product_id: AggregateId,
    pub quantity: u32,
}

impl RestockInventory {
    pub fn new(product_id: AggregateId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

impl Command for RestockInventory {
    type Aggregate = InventoryItem;

    fn aggregate_id(&self) -> AggregateId {
        self.product_id
    }
}

/// Command to reserve units for an order.
#[derive(Debug, Clone)]
pub struct ReserveInventory {
    pub product_id: AggregateId,
    pub order_id: AggregateId,
    pub quantity: u32,
}

impl ReserveInventory {
    pub fn new(product_id: AggregateId, order_id: AggregateId, quantity: u32) -> Self {
        Self {
            product_id,
            order_id,
            quantity,
        }
    }
}

impl Command for ReserveInventory {
    type Aggregate = InventoryItem;

    fn aggregate_id(&self) -> AggregateId {
        self.product_id
    }
}

/// Command to give back reserved units.
#[derive(Debug, Clone)]
pub struct ReleaseInventory {
    pub product_id: AggregateId,
    pub order_id: AggregateId,
    pub quantity: u32,
}

impl ReleaseInventory {
    pub fn new(product_id: AggregateId, order_id: AggregateId, quantity: u32) -> Self {
        Self {
            product_id,
            order_id,
            quantity,
        }
    }
}

impl Command for ReleaseInventory {
    type Aggregate = InventoryItem;

    fn aggregate_id(&self) -> AggregateId {
        self.product_id
    }
}
