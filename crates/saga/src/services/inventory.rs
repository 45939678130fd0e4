//! Inventory service port.

use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::{InventoryRow, InventoryService, Money, ReleaseInventory, ReserveInventory};
use event_store::{EventStore, ReadModelStore};

use crate::definition::SagaAction;
use crate::error::SagaError;

/// Default attempts the local adapter spends on lost concurrency races.
pub const DEFAULT_CONFLICT_ATTEMPTS: u32 = 3;

/// What the saga needs to know about a product before placing an order.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductInfo {
    pub product_id: AggregateId,
    pub name: String,
    /// Unit price.
    pub price: Money,
    pub available: u32,
}

impl From<InventoryRow> for ProductInfo {
    fn from(row: InventoryRow) -> Self {
        Self {
            product_id: row.id,
            name: row.name,
            price: row.price,
            available: row.available,
        }
    }
}

/// Commands and lookups the saga sends to the inventory service.
#[async_trait]
pub trait InventoryClient: Send + Sync {
    async fn get_product(&self, product_id: AggregateId) -> Result<Option<ProductInfo>, SagaError>;

    async fn reserve(&self, cmd: ReserveInventory) -> Result<(), SagaError>;

    async fn release(&self, cmd: ReleaseInventory) -> Result<(), SagaError>;
}

#[async_trait]
impl<C: InventoryClient + ?Sized> InventoryClient for Arc<C> {
    async fn get_product(&self, product_id: AggregateId) -> Result<Option<ProductInfo>, SagaError> {
        (**self).get_product(product_id).await
    }

    async fn reserve(&self, cmd: ReserveInventory) -> Result<(), SagaError> {
        (**self).reserve(cmd).await
    }

    async fn release(&self, cmd: ReleaseInventory) -> Result<(), SagaError> {
        (**self).release(cmd).await
    }
}

/// Calls an in-process [`InventoryService`].
///
/// Reservations reload and re-check availability after a lost concurrency
/// race, so a loser ends with `InsufficientInventory` rather than a bare
/// conflict when the winner drained the stock.
pub struct LocalInventoryClient<S: EventStore> {
    service: Arc<InventoryService<S>>,
    conflict_attempts: u32,
}

impl<S: EventStore> LocalInventoryClient<S> {
    pub fn new(service: Arc<InventoryService<S>>) -> Self {
        Self {
            service,
            conflict_attempts: DEFAULT_CONFLICT_ATTEMPTS,
        }
    }

    pub fn with_conflict_attempts(mut self, attempts: u32) -> Self {
        self.conflict_attempts = attempts.max(1);
        self
    }

    pub fn service(&self) -> &InventoryService<S> {
        &self.service
    }
}

#[async_trait]
impl<S> InventoryClient for LocalInventoryClient<S>
where
    S: EventStore + ReadModelStore<Row = InventoryRow>,
{
    async fn get_product(&self, product_id: AggregateId) -> Result<Option<ProductInfo>, SagaError> {
        self.service
            .get_product(product_id)
            .await
            .map(|row| row.map(ProductInfo::from))
            .map_err(|e| SagaError::ProductLookup {
                product_id,
                reason: e.to_string(),
            })
    }

    async fn reserve(&self, cmd: ReserveInventory) -> Result<(), SagaError> {
        self.service
            .reserve_with_retry(cmd, self.conflict_attempts)
            .await
            .map(|_| ())
            .map_err(|e| SagaError::remote(SagaAction::ReserveInventory, e))
    }

    async fn release(&self, cmd: ReleaseInventory) -> Result<(), SagaError> {
        self.service
            .release(cmd, self.conflict_attempts)
            .await
            .map(|_| ())
            .map_err(|e| SagaError::remote(SagaAction::ReleaseInventory, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{CreateInventoryItem, InventoryRowProjector};
    use event_store::InMemoryEventStore;

    async fn client_with_stock(
        quantity: u32,
    ) -> (LocalInventoryClient<InMemoryEventStore<InventoryRowProjector>>, AggregateId) {
        let service = InventoryService::new(InMemoryEventStore::new());
        let product_id = AggregateId::new();
        service
            .create_item(CreateInventoryItem::new(
                product_id,
                "Gizmo",
                quantity,
                Money::from_cents(450),
            ))
            .await
            .unwrap();
        (LocalInventoryClient::new(Arc::new(service)), product_id)
    }

    #[tokio::test]
    async fn test_get_product_reads_the_row() {
        let (client, product_id) = client_with_stock(7).await;

        let product = client.get_product(product_id).await.unwrap().unwrap();

        assert_eq!(product.name, "Gizmo");
        assert_eq!(product.price, Money::from_cents(450));
        assert_eq!(product.available, 7);
        assert!(client.get_product(AggregateId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_over_reservation_is_a_remote_failure() {
        let (client, product_id) = client_with_stock(2).await;

        let err = client
            .reserve(ReserveInventory::new(product_id, AggregateId::new(), 3))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SagaError::RemoteCall {
                action: SagaAction::ReserveInventory,
                ..
            }
        ));
        assert!(err.to_string().contains("Insufficient inventory"));
    }
}
