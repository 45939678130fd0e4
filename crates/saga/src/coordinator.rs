//! Saga coordinator: interprets a [`SagaDefinition`] against the service ports.

use std::time::Instant;

use common::AggregateId;
use domain::{Money, OrderStatus, ReleaseInventory, ReserveInventory};
use serde::Serialize;

use crate::config::SagaConfig;
use crate::definition::{SagaAction, SagaDefinition, StepKind};
use crate::error::{Result, SagaError};
use crate::log::SagaLog;
use crate::services::{InventoryClient, OrderClient, ProductInfo};

/// Request to place an order for a single product.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub customer_name: String,
    pub product_id: AggregateId,
    pub quantity: u32,
}

impl PlaceOrder {
    pub fn new(customer_name: impl Into<String>, product_id: AggregateId, quantity: u32) -> Self {
        Self {
            customer_name: customer_name.into(),
            product_id,
            quantity,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.customer_name.trim().is_empty() {
            return Err(SagaError::Validation("customer name is required".into()));
        }
        if self.quantity == 0 {
            return Err(SagaError::Validation(
                "quantity must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Everything the steps of one saga run need.
#[derive(Debug, Clone)]
pub struct SagaContext {
    pub order_id: AggregateId,
    pub customer_name: String,
    pub product_id: AggregateId,
    pub product_name: String,
    pub quantity: u32,
    pub total_price: Money,
}

/// Result of a saga that ran to a consistent end.
///
/// `success = false` means the saga failed and was compensated; terminal
/// inconsistencies are reported as [`SagaError`] instead.
#[derive(Debug, Clone, Serialize)]
pub struct SagaOutcome {
    pub order_id: AggregateId,
    pub success: bool,
    pub saga_log: SagaLog,
}

/// Orchestrates the order placement saga.
///
/// Steps run strictly one after another and every remote call, compensations
/// included, is bounded by [`SagaConfig::step_timeout`]. Saga state lives only
/// in memory for the duration of the call.
pub struct SagaCoordinator<O, I> {
    orders: O,
    inventory: I,
    config: SagaConfig,
    definition: SagaDefinition,
}

impl<O, I> SagaCoordinator<O, I>
where
    O: OrderClient,
    I: InventoryClient,
{
    pub fn new(orders: O, inventory: I) -> Self {
        Self::with_config(orders, inventory, SagaConfig::default())
    }

    pub fn with_config(orders: O, inventory: I, config: SagaConfig) -> Self {
        let definition =
            SagaDefinition::place_order().with_retriable_attempts(config.confirm_attempts);
        Self {
            orders,
            inventory,
            config,
            definition,
        }
    }

    pub fn orders(&self) -> &O {
        &self.orders
    }

    pub fn inventory(&self) -> &I {
        &self.inventory
    }

    pub fn config(&self) -> &SagaConfig {
        &self.config
    }

    /// Places an order: looks up the product for its name and unit price,
    /// then runs the `PlaceOrder` saga under a fresh order id.
    #[tracing::instrument(
        skip(self, request),
        fields(
            customer = %request.customer_name,
            product_id = %request.product_id,
            quantity = request.quantity,
            order_id = tracing::field::Empty
        )
    )]
    pub async fn place_order(&self, request: PlaceOrder) -> Result<SagaOutcome> {
        request.validate()?;

        let product = self
            .lookup_product(request.product_id)
            .await?
            .ok_or_else(|| {
                SagaError::Validation(format!("product {} not found", request.product_id))
            })?;
        let total_price = product
            .price
            .checked_times(request.quantity)
            .ok_or_else(|| {
                SagaError::Validation(format!(
                    "total price of {} x {} is out of range",
                    request.quantity, product.price
                ))
            })?;

        let order_id = AggregateId::new();
        tracing::Span::current().record("order_id", tracing::field::display(order_id));

        let ctx = SagaContext {
            order_id,
            customer_name: request.customer_name,
            product_id: request.product_id,
            product_name: product.name,
            quantity: request.quantity,
            total_price,
        };

        self.run(&self.definition, &ctx).await
    }

    /// Interprets `definition` for one saga run.
    pub async fn run(&self, definition: &SagaDefinition, ctx: &SagaContext) -> Result<SagaOutcome> {
        let started = Instant::now();
        let mut log = SagaLog::new();
        let mut compensations: Vec<SagaAction> = Vec::new();

        for step in definition.steps() {
            match step.kind {
                StepKind::Compensable(_) | StepKind::Pivot => {
                    tracing::info!(step = %step.action, "saga step started");

                    if let Err(e) = self.invoke(step.action, ctx, None).await {
                        tracing::warn!(step = %step.action, error = %e, "saga step failed");
                        log.failed(step.action, &e);

                        let reason = e.to_string();
                        let result = self.compensate(&compensations, ctx, &reason, log).await;
                        let outcome = match (&result, compensations.is_empty()) {
                            (Err(_), _) => "compensation_failed",
                            (Ok(_), true) => "failed",
                            (Ok(_), false) => "compensated",
                        };
                        record_finish(definition, started, outcome);

                        let saga_log = result?;
                        tracing::warn!(order_id = %ctx.order_id, %reason, "saga compensated");
                        return Ok(SagaOutcome {
                            order_id: ctx.order_id,
                            success: false,
                            saga_log,
                        });
                    }

                    log.completed(step.action);
                    if let Some(compensation) = step.compensation() {
                        compensations.push(compensation);
                    }
                }
                StepKind::Retriable { attempts } => {
                    tracing::info!(step = %step.action, attempts, "saga step started");

                    if let Err(e) = self.retry(step.action, attempts, ctx).await {
                        let reason = format!("{e} (after {attempts} attempts)");
                        log.failed(step.action, &reason);
                        record_finish(definition, started, "forward_recovery_failed");
                        tracing::error!(
                            order_id = %ctx.order_id,
                            step = %step.action,
                            error = %reason,
                            "forward recovery failed, manual reconciliation required"
                        );
                        return Err(SagaError::ForwardRecoveryFailed {
                            order_id: ctx.order_id,
                            reason,
                            log,
                        });
                    }

                    log.completed(step.action);
                }
            }
        }

        record_finish(definition, started, "completed");
        tracing::info!(
            order_id = %ctx.order_id,
            duration = started.elapsed().as_secs_f64(),
            "saga completed successfully"
        );

        Ok(SagaOutcome {
            order_id: ctx.order_id,
            success: true,
            saga_log: log,
        })
    }

    /// Runs compensations newest first, once each.
    async fn compensate(
        &self,
        compensations: &[SagaAction],
        ctx: &SagaContext,
        reason: &str,
        mut log: SagaLog,
    ) -> Result<SagaLog> {
        for &action in compensations.iter().rev() {
            metrics::counter!("saga_compensations_total", "action" => action.as_str())
                .increment(1);

            match self.invoke(action, ctx, Some(reason)).await {
                Ok(()) => log.compensated(action),
                Err(e) => {
                    log.failed(action, &e);
                    tracing::error!(
                        order_id = %ctx.order_id,
                        compensation = %action,
                        error = %e,
                        "compensation failed, manual reconciliation required"
                    );
                    return Err(SagaError::CompensationFailed {
                        order_id: ctx.order_id,
                        reason: e.to_string(),
                        log,
                    });
                }
            }
        }
        Ok(log)
    }

    /// Invokes `action` until it succeeds or `attempts` are used up.
    async fn retry(&self, action: SagaAction, attempts: u32, ctx: &SagaContext) -> Result<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.invoke(action, ctx, None).await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };
            if self.already_applied(action, ctx).await {
                tracing::info!(step = %action, attempt, error = %err, "saga step had taken effect");
                return Ok(());
            }
            if attempt >= attempts {
                return Err(err);
            }
            tracing::warn!(step = %action, attempt, attempts, error = %err, "retrying saga step");
            tokio::time::sleep(self.config.retry_backoff).await;
        }
    }

    /// True when a failed call committed anyway and only its reply was lost.
    async fn already_applied(&self, action: SagaAction, ctx: &SagaContext) -> bool {
        let expected = match action {
            SagaAction::ConfirmOrder => OrderStatus::Confirmed,
            _ => return false,
        };
        match self
            .bounded(action, self.orders.order_status(ctx.order_id))
            .await
        {
            Ok(status) => status == Some(expected),
            Err(e) => {
                tracing::debug!(step = %action, error = %e, "order status unavailable");
                false
            }
        }
    }

    async fn lookup_product(&self, product_id: AggregateId) -> Result<Option<ProductInfo>> {
        let lookup = self.inventory.get_product(product_id);
        match tokio::time::timeout(self.config.step_timeout, lookup).await {
            Ok(result) => result,
            Err(_) => Err(SagaError::ProductLookup {
                product_id,
                reason: format!("timed out after {}ms", self.config.step_timeout.as_millis()),
            }),
        }
    }

    async fn invoke(
        &self,
        action: SagaAction,
        ctx: &SagaContext,
        reason: Option<&str>,
    ) -> Result<()> {
        match action {
            SagaAction::CreateOrder => {
                let cmd = domain::CreateOrder::new(
                    ctx.order_id,
                    ctx.customer_name.clone(),
                    ctx.product_id,
                    ctx.product_name.clone(),
                    ctx.quantity,
                    ctx.total_price,
                );
                self.bounded(action, self.orders.create_order(cmd)).await
            }
            SagaAction::ReserveInventory => {
                let cmd = ReserveInventory::new(ctx.product_id, ctx.order_id, ctx.quantity);
                self.bounded(action, self.inventory.reserve(cmd)).await
            }
            SagaAction::ConfirmOrder => {
                self.bounded(action, self.orders.confirm_order(ctx.order_id))
                    .await
            }
            SagaAction::CancelOrder => {
                let reason = reason.unwrap_or("saga compensation").to_string();
                self.bounded(action, self.orders.cancel_order(ctx.order_id, reason))
                    .await
            }
            SagaAction::ReleaseInventory => {
                let cmd = ReleaseInventory::new(ctx.product_id, ctx.order_id, ctx.quantity);
                self.bounded(action, self.inventory.release(cmd)).await
            }
        }
    }

    /// Applies the step timeout to a remote call.
    async fn bounded<T>(
        &self,
        action: SagaAction,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.config.step_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(SagaError::Timeout {
                action,
                after: self.config.step_timeout,
            }),
        }
    }
}

fn record_finish(definition: &SagaDefinition, started: Instant, outcome: &'static str) {
    metrics::counter!(
        "saga_executions_total",
        "saga" => definition.name(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("saga_duration_seconds", "saga" => definition.name())
        .record(started.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::log::StepStatus;
    use crate::services::{LocalInventoryClient, LocalOrderClient};
    use domain::{
        CreateInventoryItem, InventoryRowProjector, InventoryService, OrderRowProjector,
        OrderService,
    };
    use event_store::InMemoryEventStore;

    type Orders = LocalOrderClient<InMemoryEventStore<OrderRowProjector>>;
    type Inventory = LocalInventoryClient<InMemoryEventStore<InventoryRowProjector>>;

    async fn setup(quantity: u32, reserved: u32) -> (SagaCoordinator<Orders, Inventory>, AggregateId) {
        let orders = Arc::new(OrderService::new(InMemoryEventStore::new()));
        let inventory = Arc::new(InventoryService::new(InMemoryEventStore::new()));

        let product_id = AggregateId::new();
        inventory
            .create_item(CreateInventoryItem::new(
                product_id,
                "Widget",
                quantity,
                Money::from_cents(1999),
            ))
            .await
            .unwrap();
        if reserved > 0 {
            inventory
                .reserve(ReserveInventory::new(product_id, AggregateId::new(), reserved))
                .await
                .unwrap();
        }

        let coordinator = SagaCoordinator::new(
            LocalOrderClient::new(orders),
            LocalInventoryClient::new(inventory),
        );
        (coordinator, product_id)
    }

    #[tokio::test]
    async fn test_happy_path_confirms_and_reserves() {
        let (coordinator, product_id) = setup(50, 0).await;

        let outcome = coordinator
            .place_order(PlaceOrder::new("Ada", product_id, 3))
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(
            outcome.saga_log.summary(),
            vec![
                (SagaAction::CreateOrder, StepStatus::Completed),
                (SagaAction::ReserveInventory, StepStatus::Completed),
                (SagaAction::ConfirmOrder, StepStatus::Completed),
            ]
        );

        let order = coordinator
            .orders()
            .service()
            .get_order(outcome.order_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.total_price, Money::from_cents(5997));

        let row = coordinator
            .inventory()
            .service()
            .get_product(product_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!((row.quantity, row.reserved, row.available), (50, 3, 47));
    }

    #[tokio::test]
    async fn test_insufficient_inventory_compensates_by_cancelling() {
        let (coordinator, product_id) = setup(50, 48).await;

        let outcome = coordinator
            .place_order(PlaceOrder::new("Ada", product_id, 5))
            .await
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(
            outcome.saga_log.summary(),
            vec![
                (SagaAction::CreateOrder, StepStatus::Completed),
                (SagaAction::ReserveInventory, StepStatus::Failed),
                (SagaAction::CancelOrder, StepStatus::Compensated),
            ]
        );
        let failure = outcome.saga_log.entries()[1].error.as_deref().unwrap();
        assert!(failure.contains("Insufficient inventory"));

        let order = coordinator
            .orders()
            .service()
            .get_order(outcome.order_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);

        let row = coordinator
            .inventory()
            .service()
            .get_product(product_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.reserved, 48);
    }

    #[tokio::test]
    async fn test_unknown_product_is_rejected_before_any_step() {
        let (coordinator, _) = setup(1, 0).await;

        let err = coordinator
            .place_order(PlaceOrder::new("Ada", AggregateId::new(), 1))
            .await
            .unwrap_err();

        assert!(matches!(err, SagaError::Validation(_)));
        let orders = coordinator.orders().service().list_orders().await.unwrap();
        assert!(orders.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected() {
        let (coordinator, product_id) = setup(1, 0).await;

        let empty_name = coordinator
            .place_order(PlaceOrder::new("  ", product_id, 1))
            .await;
        let zero_quantity = coordinator
            .place_order(PlaceOrder::new("Ada", product_id, 0))
            .await;

        assert!(matches!(empty_name, Err(SagaError::Validation(_))));
        assert!(matches!(zero_quantity, Err(SagaError::Validation(_))));
    }

    #[tokio::test]
    async fn test_total_price_overflow_is_rejected_before_any_step() {
        let orders = Arc::new(OrderService::new(
            InMemoryEventStore::<OrderRowProjector>::new(),
        ));
        let inventory = Arc::new(InventoryService::new(
            InMemoryEventStore::<InventoryRowProjector>::new(),
        ));
        let product_id = AggregateId::new();
        inventory
            .create_item(CreateInventoryItem::new(
                product_id,
                "Yacht",
                10,
                Money::from_cents(i64::MAX / 2),
            ))
            .await
            .unwrap();
        let coordinator = SagaCoordinator::new(
            LocalOrderClient::new(orders),
            LocalInventoryClient::new(inventory),
        );

        let err = coordinator
            .place_order(PlaceOrder::new("Ada", product_id, 3))
            .await
            .unwrap_err();

        assert!(matches!(err, SagaError::Validation(_)));
        assert!(coordinator.orders().service().list_orders().await.unwrap().is_empty());
        let row = coordinator
            .inventory()
            .service()
            .get_product(product_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.reserved, 0);
    }
}
