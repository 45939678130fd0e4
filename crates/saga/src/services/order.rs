//! Order service port.

use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::{
    CancelOrder, ConfirmOrder, CreateOrder, DomainError, OrderError, OrderRow, OrderService,
    OrderStatus,
};
use event_store::{EventStore, ReadModelStore};

use crate::definition::SagaAction;
use crate::error::SagaError;

/// Commands the saga sends to the order service.
#[async_trait]
pub trait OrderClient: Send + Sync {
    async fn create_order(&self, cmd: CreateOrder) -> Result<(), SagaError>;

    async fn confirm_order(&self, order_id: AggregateId) -> Result<(), SagaError>;

    async fn cancel_order(&self, order_id: AggregateId, reason: String) -> Result<(), SagaError>;

    /// Current status of the order, `None` when it does not exist.
    async fn order_status(&self, order_id: AggregateId) -> Result<Option<OrderStatus>, SagaError>;
}

#[async_trait]
impl<C: OrderClient + ?Sized> OrderClient for Arc<C> {
    async fn create_order(&self, cmd: CreateOrder) -> Result<(), SagaError> {
        (**self).create_order(cmd).await
    }

    async fn confirm_order(&self, order_id: AggregateId) -> Result<(), SagaError> {
        (**self).confirm_order(order_id).await
    }

    async fn cancel_order(&self, order_id: AggregateId, reason: String) -> Result<(), SagaError> {
        (**self).cancel_order(order_id, reason).await
    }

    async fn order_status(&self, order_id: AggregateId) -> Result<Option<OrderStatus>, SagaError> {
        (**self).order_status(order_id).await
    }
}

/// Calls an in-process [`OrderService`].
///
/// Confirming an order that is already confirmed succeeds, so a confirm
/// can be re-sent after its reply was lost.
pub struct LocalOrderClient<S: EventStore> {
    service: Arc<OrderService<S>>,
}

impl<S: EventStore> LocalOrderClient<S> {
    pub fn new(service: Arc<OrderService<S>>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &OrderService<S> {
        &self.service
    }
}

#[async_trait]
impl<S> OrderClient for LocalOrderClient<S>
where
    S: EventStore + ReadModelStore<Row = OrderRow>,
{
    async fn create_order(&self, cmd: CreateOrder) -> Result<(), SagaError> {
        self.service
            .create_order(cmd)
            .await
            .map(|_| ())
            .map_err(|e| SagaError::remote(SagaAction::CreateOrder, e))
    }

    async fn confirm_order(&self, order_id: AggregateId) -> Result<(), SagaError> {
        match self.service.confirm_order(ConfirmOrder::new(order_id)).await {
            Ok(_) => Ok(()),
            Err(DomainError::Order(OrderError::InvalidStateTransition {
                current_status: OrderStatus::Confirmed,
                ..
            })) => {
                tracing::debug!(%order_id, "order already confirmed");
                Ok(())
            }
            Err(e) => Err(SagaError::remote(SagaAction::ConfirmOrder, e)),
        }
    }

    async fn cancel_order(&self, order_id: AggregateId, reason: String) -> Result<(), SagaError> {
        self.service
            .cancel_order(CancelOrder::new(order_id, reason))
            .await
            .map(|_| ())
            .map_err(|e| SagaError::remote(SagaAction::CancelOrder, e))
    }

    async fn order_status(&self, order_id: AggregateId) -> Result<Option<OrderStatus>, SagaError> {
        self.service
            .get_order(order_id)
            .await
            .map(|row| row.map(|row| row.status))
            .map_err(|e| SagaError::remote(SagaAction::ConfirmOrder, e))
    }
}
