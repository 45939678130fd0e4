//! Inventory service: the inventory-owning side of the command surface.

use std::sync::Arc;

use common::AggregateId;
use event_store::{EventPublisher, EventStore, ReadModelStore};

use crate::command::{Command, CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{
    CreateInventoryItem, InventoryItem, InventoryRow, ReleaseInventory, ReserveInventory,
    RestockInventory,
};

/// Service for managing product stock.
pub struct InventoryService<S: EventStore> {
    handler: CommandHandler<S, InventoryItem>,
}

impl<S: EventStore> InventoryService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Creates an inventory service that publishes committed events.
    pub fn with_publisher(store: S, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            handler: CommandHandler::with_publisher(store, publisher),
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, InventoryItem> {
        &self.handler
    }

    /// Stocks a new product.
    #[tracing::instrument(skip(self))]
    pub async fn create_item(
        &self,
        cmd: CreateInventoryItem,
    ) -> Result<CommandResult<InventoryItem>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), |item| item.create(&cmd))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn restock(
        &self,
        cmd: RestockInventory,
    ) -> Result<CommandResult<InventoryItem>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), |item| item.restock(cmd.quantity))
            .await
    }

    /// Reserves units once; a lost race surfaces as `ConcurrencyConflict`.
    #[tracing::instrument(skip(self))]
    pub async fn reserve(
        &self,
        cmd: ReserveInventory,
    ) -> Result<CommandResult<InventoryItem>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), |item| {
                item.reserve(cmd.order_id, cmd.quantity)
            })
            .await
    }

    /// Reserves units, reloading and re-checking availability after each
    /// lost race, up to `max_attempts` attempts.
    #[tracing::instrument(skip(self))]
    pub async fn reserve_with_retry(
        &self,
        cmd: ReserveInventory,
        max_attempts: u32,
    ) -> Result<CommandResult<InventoryItem>, DomainError> {
        self.handler
            .execute_with_retry(cmd.aggregate_id(), max_attempts, |item| {
                item.reserve(cmd.order_id, cmd.quantity)
            })
            .await
    }

    /// Releases a reservation.
    #[tracing::instrument(skip(self))]
    pub async fn release(
        &self,
        cmd: ReleaseInventory,
        max_attempts: u32,
    ) -> Result<CommandResult<InventoryItem>, DomainError> {
        self.handler
            .execute_with_retry(cmd.aggregate_id(), max_attempts, |item| {
                item.release(cmd.order_id, cmd.quantity)
            })
            .await
    }

    /// Replays an item from its events.
    pub async fn load_item(
        &self,
        product_id: AggregateId,
    ) -> Result<Option<InventoryItem>, DomainError> {
        self.handler.load_existing(product_id).await
    }
}

impl<S> InventoryService<S>
where
    S: EventStore + ReadModelStore<Row = InventoryRow>,
{
    /// Reads a product from the read model.
    pub async fn get_product(
        &self,
        product_id: AggregateId,
    ) -> Result<Option<InventoryRow>, DomainError> {
        Ok(self.handler.store().get_row(product_id).await?)
    }

    /// Lists all products by name.
    pub async fn list_products(&self) -> Result<Vec<InventoryRow>, DomainError> {
        let mut rows = self.handler.store().list_rows().await?;
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }
}
