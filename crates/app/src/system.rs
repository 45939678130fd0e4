//! Wires stores, services, the saga and the analytics side together.

use std::sync::Arc;

use common::AggregateKind;
use domain::{
    InventoryRow, InventoryRowProjector, InventoryService, OrderRow, OrderRowProjector,
    OrderService,
};
use event_store::{
    BroadcastPublisher, EventStore, InMemoryEventStore, PostgresEventStore, ReadModelStore,
};
use projections::{
    BackfillReport, GapRecord, ProjectionProcessor, ProjectionSubscriber, SalesAnalytics,
    SubscriberHandle,
};
use saga::{LocalInventoryClient, LocalOrderClient, SagaCoordinator};
use sqlx::postgres::PgPoolOptions;

use crate::Result;
use crate::config::Config;

const MAX_DB_CONNECTIONS: u32 = 10;

pub type InMemorySystem = FulfillmentSystem<
    InMemoryEventStore<OrderRowProjector>,
    InMemoryEventStore<InventoryRowProjector>,
>;

pub type PostgresSystem = FulfillmentSystem<
    PostgresEventStore<OrderRowProjector>,
    PostgresEventStore<InventoryRowProjector>,
>;

pub type Coordinator<OS, IS> = SagaCoordinator<LocalOrderClient<OS>, LocalInventoryClient<IS>>;

/// The running service: order and inventory owners, the placement saga,
/// and the analytics views kept current by a subscriber task.
pub struct FulfillmentSystem<OS, IS>
where
    OS: EventStore + ReadModelStore<Row = OrderRow>,
    IS: EventStore + ReadModelStore<Row = InventoryRow>,
{
    publisher: Arc<BroadcastPublisher>,
    orders: Arc<OrderService<OS>>,
    inventory: Arc<InventoryService<IS>>,
    saga: Coordinator<OS, IS>,
    analytics: SalesAnalytics,
    subscriber: SubscriberHandle,
}

impl<OS, IS> FulfillmentSystem<OS, IS>
where
    OS: EventStore + ReadModelStore<Row = OrderRow>,
    IS: EventStore + ReadModelStore<Row = InventoryRow>,
{
    /// Builds the services over the given stores and spawns the projection
    /// subscriber. Must run inside the tokio runtime.
    pub fn start(order_store: OS, inventory_store: IS, config: &Config) -> Self {
        let publisher = Arc::new(BroadcastPublisher::new(config.event_channel_capacity));
        let orders = Arc::new(OrderService::with_publisher(order_store, publisher.clone()));
        let inventory = Arc::new(InventoryService::with_publisher(
            inventory_store,
            publisher.clone(),
        ));

        let saga = SagaCoordinator::with_config(
            LocalOrderClient::new(orders.clone()),
            LocalInventoryClient::new(inventory.clone()),
            config.saga_config(),
        );

        let analytics = SalesAnalytics::new();
        let subscriber =
            ProjectionSubscriber::with_config(analytics.projections(), config.subscriber_config())
                .start(publisher.subscribe());

        tracing::info!(
            channel_capacity = config.event_channel_capacity,
            "fulfillment system started"
        );

        Self {
            publisher,
            orders,
            inventory,
            saga,
            analytics,
            subscriber,
        }
    }

    pub fn orders(&self) -> &OrderService<OS> {
        &self.orders
    }

    pub fn inventory(&self) -> &InventoryService<IS> {
        &self.inventory
    }

    pub fn saga(&self) -> &Coordinator<OS, IS> {
        &self.saga
    }

    pub fn analytics(&self) -> &SalesAnalytics {
        &self.analytics
    }

    pub fn publisher(&self) -> &BroadcastPublisher {
        &self.publisher
    }

    /// Gaps the subscriber has recorded so far.
    pub async fn gaps(&self) -> Vec<GapRecord> {
        self.subscriber.gaps().await
    }

    /// Replays both stores into the analytics views. Already applied events
    /// are skipped, so this only fills gaps.
    ///
    /// Each store contributes only its own aggregates, so a log shared by
    /// both stores is read once per event.
    #[tracing::instrument(skip(self))]
    pub async fn backfill(&self) -> Result<BackfillReport> {
        let processor = ProjectionProcessor::new(self.analytics.projections());
        let mut report = processor
            .backfill_kind(self.orders.handler().store(), AggregateKind::Order)
            .await?;
        report.merge(
            processor
                .backfill_kind(self.inventory.handler().store(), AggregateKind::Inventory)
                .await?,
        );
        Ok(report)
    }

    /// Stops the subscriber and returns the gaps it left behind.
    pub async fn shutdown(self) -> Vec<GapRecord> {
        let gaps = self.subscriber.stop().await;
        tracing::info!(gaps = gaps.len(), "fulfillment system stopped");
        gaps
    }
}

/// Starts the system on in-memory stores.
pub fn in_memory(config: &Config) -> InMemorySystem {
    FulfillmentSystem::start(InMemoryEventStore::new(), InMemoryEventStore::new(), config)
}

/// Connects to Postgres, runs the migrations and starts the system on it.
///
/// Both stores share the pool and the `events` table.
pub async fn connect_postgres(database_url: &str, config: &Config) -> Result<PostgresSystem> {
    let pool = PgPoolOptions::new()
        .max_connections(MAX_DB_CONNECTIONS)
        .connect(database_url)
        .await?;

    let order_store = PostgresEventStore::<OrderRowProjector>::new(pool.clone());
    order_store.run_migrations().await?;
    let inventory_store = PostgresEventStore::<InventoryRowProjector>::new(pool);

    tracing::info!("connected to Postgres");
    Ok(FulfillmentSystem::start(order_store, inventory_store, config))
}
