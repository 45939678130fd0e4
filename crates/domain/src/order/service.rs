//! Order service: the order-owning side of the command surface.

use std::sync::Arc;

use common::AggregateId;
use event_store::{EventPublisher, EventStore, ReadModelStore};

use crate::command::{Command, CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{CancelOrder, ConfirmOrder, CreateOrder, Order, OrderRow};

/// Service for managing orders.
///
/// Wraps the command handler for [`Order`] and exposes the order read model.
pub struct OrderService<S: EventStore> {
    handler: CommandHandler<S, Order>,
}

impl<S: EventStore> OrderService<S> {
    /// Creates a new order service with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Creates an order service that publishes committed events.
    pub fn with_publisher(store: S, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            handler: CommandHandler::with_publisher(store, publisher),
        }
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, Order> {
        &self.handler
    }

    /// Creates a new order in `PENDING`.
    #[tracing::instrument(skip(self))]
    pub async fn create_order(
        &self,
        cmd: CreateOrder,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), |order| order.create(&cmd))
            .await
    }

    /// Confirms a pending order.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_order(
        &self,
        cmd: ConfirmOrder,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), |order| order.confirm())
            .await
    }

    /// Cancels a pending order.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        cmd: CancelOrder,
    ) -> Result<CommandResult<Order>, DomainError> {
        let reason = cmd.reason.clone();

        self.handler
            .execute(cmd.aggregate_id(), |order| order.cancel(reason))
            .await
    }

    /// Replays an order from its events.
    ///
    /// Returns None if the order doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn load_order(&self, order_id: AggregateId) -> Result<Option<Order>, DomainError> {
        self.handler.load_existing(order_id).await
    }
}

impl<S> OrderService<S>
where
    S: EventStore + ReadModelStore<Row = OrderRow>,
{
    /// Reads an order from the read model.
    pub async fn get_order(&self, order_id: AggregateId) -> Result<Option<OrderRow>, DomainError> {
        Ok(self.handler.store().get_row(order_id).await?)
    }

    /// Lists all orders, newest first.
    pub async fn list_orders(&self) -> Result<Vec<OrderRow>, DomainError> {
        let mut rows = self.handler.store().list_rows().await?;
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregate;
    use crate::money::Money;
    use crate::order::{OrderError, OrderRowProjector, OrderStatus};
    use event_store::{InMemoryEventStore, Version};

    fn create_service() -> OrderService<InMemoryEventStore<OrderRowProjector>> {
        OrderService::new(InMemoryEventStore::new())
    }

    fn create_cmd() -> CreateOrder {
        CreateOrder::new(
            AggregateId::new(),
            "Ada",
            AggregateId::new(),
            "Widget",
            2,
            Money::from_cents(2000),
        )
    }

    #[tokio::test]
    async fn test_create_order() {
        let service = create_service();
        let cmd = create_cmd();
        let order_id = cmd.order_id;

        let result = service.create_order(cmd).await.unwrap();

        assert_eq!(result.aggregate.id(), Some(order_id));
        assert_eq!(result.aggregate.status(), OrderStatus::Pending);
        assert_eq!(result.new_version, Version::first());
    }

    #[tokio::test]
    async fn test_confirm_order_updates_read_model() {
        let service = create_service();
        let cmd = create_cmd();
        let order_id = cmd.order_id;
        service.create_order(cmd).await.unwrap();

        service
            .confirm_order(ConfirmOrder::new(order_id))
            .await
            .unwrap();

        let row = service.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(row.status, OrderStatus::Confirmed);
        assert_eq!(row.version, 2);
    }

    #[tokio::test]
    async fn test_cancel_order_records_reason() {
        let service = create_service();
        let cmd = create_cmd();
        let order_id = cmd.order_id;
        service.create_order(cmd).await.unwrap();

        let result = service
            .cancel_order(CancelOrder::new(order_id, "Insufficient inventory"))
            .await
            .unwrap();

        assert_eq!(result.aggregate.status(), OrderStatus::Cancelled);
        let row = service.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(row.cancel_reason.as_deref(), Some("Insufficient inventory"));
    }

    #[tokio::test]
    async fn test_commands_on_missing_order_fail_with_not_found() {
        let service = create_service();

        let err = service
            .confirm_order(ConfirmOrder::new(AggregateId::new()))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_terminal_order_rejects_commands_without_writing() {
        let service = create_service();
        let cmd = create_cmd();
        let order_id = cmd.order_id;
        service.create_order(cmd).await.unwrap();
        service
            .confirm_order(ConfirmOrder::new(order_id))
            .await
            .unwrap();

        let err = service
            .cancel_order(CancelOrder::new(order_id, "late"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::Order(OrderError::InvalidStateTransition { .. })
        ));
        let events = service.handler().store().load_events(order_id).await.unwrap();
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_load_and_list_orders() {
        let service = create_service();
        assert!(service.load_order(AggregateId::new()).await.unwrap().is_none());

        let first = create_cmd();
        let first_id = first.order_id;
        service.create_order(first).await.unwrap();
        service.create_order(create_cmd()).await.unwrap();

        let order = service.load_order(first_id).await.unwrap().unwrap();
        assert_eq!(order.customer_name(), "Ada");
        assert_eq!(service.list_orders().await.unwrap().len(), 2);
    }
}
