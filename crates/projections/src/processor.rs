//! Projection processor for feeding stored events to projections.

use std::sync::Arc;

use common::AggregateKind;
use event_store::{EventEnvelope, EventStore, EventStoreExt, EventStream};
use futures_util::StreamExt;

use crate::Result;
use crate::projection::{Applied, Projection};
use crate::subscriber::{GapRecord, skipped};

/// Counts from one backfill pass, summed over projections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackfillReport {
    pub events_read: u64,
    pub applied: u64,
    pub duplicates: u64,
    pub ignored: u64,
    /// Events a projection rejected; the pass went on without them.
    pub failed: Vec<GapRecord>,
}

impl BackfillReport {
    fn count(&mut self, applied: Applied) {
        match applied {
            Applied::Changed => self.applied += 1,
            Applied::Duplicate => self.duplicates += 1,
            Applied::Ignored => self.ignored += 1,
        }
    }

    /// Adds another pass's counts to this one.
    pub fn merge(&mut self, other: BackfillReport) {
        self.events_read += other.events_read;
        self.applied += other.applied;
        self.duplicates += other.duplicates;
        self.ignored += other.ignored;
        self.failed.extend(other.failed);
    }
}

/// Replays events from event stores into projections.
///
/// This is the repair path for the subscriber: gaps left by lag or skipped
/// events are filled by backfilling from the stores. Because every
/// projection deduplicates on `(aggregate_id, version)`, a backfill over
/// views that are already partially current only applies what is missing.
/// An event a projection rejects is logged and reported, never fatal.
pub struct ProjectionProcessor {
    projections: Vec<Arc<dyn Projection>>,
}

impl ProjectionProcessor {
    pub fn new(projections: Vec<Arc<dyn Projection>>) -> Self {
        Self { projections }
    }

    /// Registers a projection with this processor.
    pub fn register(&mut self, projection: Arc<dyn Projection>) {
        self.projections.push(projection);
    }

    /// Returns the number of registered projections.
    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Streams a store's whole log, in commit order, through every projection.
    #[tracing::instrument(skip_all)]
    pub async fn backfill(&self, store: &dyn EventStore) -> Result<BackfillReport> {
        self.replay(store.stream_all_events().await?).await
    }

    /// Like [`backfill`](Self::backfill), restricted to one aggregate kind.
    ///
    /// Used when several stores share one log, so each event is read once.
    #[tracing::instrument(skip(self, store))]
    pub async fn backfill_kind(
        &self,
        store: &dyn EventStore,
        kind: AggregateKind,
    ) -> Result<BackfillReport> {
        self.replay(store.stream_events_of(kind.as_str()).await?)
            .await
    }

    async fn replay(&self, mut stream: EventStream) -> Result<BackfillReport> {
        let mut report = BackfillReport::default();

        while let Some(result) = stream.next().await {
            let event = result?;
            report.events_read += 1;

            for projection in &self.projections {
                match projection.handle(&event).await {
                    Ok(applied) => report.count(applied),
                    Err(e) => {
                        tracing::warn!(
                            projection = projection.name(),
                            aggregate_id = %event.aggregate_id,
                            version = %event.version,
                            event_type = %event.event_type,
                            error = %e,
                            "backfill could not apply event"
                        );
                        metrics::counter!(
                            "projections_failures_total",
                            "projection" => projection.name()
                        )
                        .increment(1);
                        report
                            .failed
                            .push(GapRecord::new(skipped(projection.as_ref(), &event, 1, &e)));
                    }
                }
            }
        }

        metrics::counter!("projections_backfilled_events_total").increment(report.events_read);
        tracing::info!(
            events_read = report.events_read,
            applied = report.applied,
            duplicates = report.duplicates,
            failed = report.failed.len(),
            "backfill complete"
        );

        Ok(report)
    }

    /// Delivers a single event to all registered projections.
    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type))]
    pub async fn process_event(&self, event: &EventEnvelope) -> Result<()> {
        for projection in &self.projections {
            projection.handle(event).await?;
        }
        Ok(())
    }

    /// Resets all projections and replays every given store from scratch.
    #[tracing::instrument(skip_all, fields(stores = stores.len()))]
    pub async fn rebuild(&self, stores: &[&dyn EventStore]) -> Result<BackfillReport> {
        for projection in &self.projections {
            projection.reset().await?;
        }

        let mut total = BackfillReport::default();
        for store in stores {
            total.merge(self.backfill(*store).await?);
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::ProjectionPosition;
    use crate::views::OrderSnapshotView;
    use async_trait::async_trait;
    use common::AggregateId;
    use domain::{DomainEvent, OrderEvent, OrderStatus};
    use event_store::{InMemoryEventStore, NewEvent, Version};
    use tokio::sync::RwLock;

    /// Counts every event it sees, without deduplication.
    #[derive(Default)]
    struct CountingProjection {
        count: Arc<RwLock<u64>>,
    }

    #[async_trait]
    impl Projection for CountingProjection {
        fn name(&self) -> &'static str {
            "CountingProjection"
        }

        async fn handle(&self, _event: &EventEnvelope) -> Result<Applied> {
            *self.count.write().await += 1;
            Ok(Applied::Changed)
        }

        async fn position(&self) -> ProjectionPosition {
            ProjectionPosition {
                applied: *self.count.read().await,
                last: None,
            }
        }

        async fn reset(&self) -> Result<()> {
            *self.count.write().await = 0;
            Ok(())
        }
    }

    async fn append(store: &InMemoryEventStore, order_id: AggregateId, event: OrderEvent) {
        let expected = store
            .aggregate_version(order_id)
            .await
            .unwrap()
            .unwrap_or_default();
        let new_event = NewEvent::from_payload(order_id, "Order", event.event_type(), &event).unwrap();
        store.append(new_event, expected).await.unwrap();
    }

    async fn store_with_orders(count: usize) -> (InMemoryEventStore, Vec<AggregateId>) {
        let store = InMemoryEventStore::new();
        let mut ids = Vec::new();
        for i in 0..count {
            let order_id = AggregateId::new();
            append(
                &store,
                order_id,
                OrderEvent::order_created(
                    order_id,
                    format!("Customer {i}"),
                    AggregateId::new(),
                    "Widget",
                    1,
                    domain::Money::from_cents(100),
                ),
            )
            .await;
            append(&store, order_id, OrderEvent::order_confirmed(order_id)).await;
            ids.push(order_id);
        }
        (store, ids)
    }

    #[tokio::test]
    async fn test_backfill_processes_all_events() {
        let (store, ids) = store_with_orders(3).await;
        let view = OrderSnapshotView::new();
        let processor = ProjectionProcessor::new(vec![Arc::new(view.clone())]);

        let report = processor.backfill(&store).await.unwrap();

        assert_eq!(report.events_read, 6);
        assert_eq!(report.applied, 6);
        for id in ids {
            assert_eq!(view.get(id).await.unwrap().status, OrderStatus::Confirmed);
        }
    }

    #[tokio::test]
    async fn test_second_backfill_only_sees_duplicates() {
        let (store, _) = store_with_orders(2).await;
        let view = OrderSnapshotView::new();
        let processor = ProjectionProcessor::new(vec![Arc::new(view.clone())]);

        processor.backfill(&store).await.unwrap();
        let report = processor.backfill(&store).await.unwrap();

        assert_eq!(report.applied, 0);
        assert_eq!(report.duplicates, 4);
        assert_eq!(view.position().await.applied, 4);
    }

    #[tokio::test]
    async fn test_process_single_event() {
        let counting = CountingProjection::default();
        let count_ref = Arc::clone(&counting.count);
        let processor = ProjectionProcessor::new(vec![Arc::new(counting)]);

        let event = NewEvent::new(AggregateId::new(), "Order", "TestEvent", serde_json::json!({}))
            .into_envelope(Version::first());
        processor.process_event(&event).await.unwrap();

        assert_eq!(*count_ref.read().await, 1);
    }

    #[tokio::test]
    async fn test_rebuild_resets_and_replays() {
        let (store, _) = store_with_orders(2).await;
        let counting = CountingProjection::default();
        let count_ref = Arc::clone(&counting.count);
        let processor = ProjectionProcessor::new(vec![Arc::new(counting)]);

        processor.backfill(&store).await.unwrap();
        assert_eq!(*count_ref.read().await, 4);

        let stores: [&dyn EventStore; 1] = [&store];
        let report = processor.rebuild(&stores).await.unwrap();
        assert_eq!(report.events_read, 4);
        assert_eq!(*count_ref.read().await, 4);
    }

    #[tokio::test]
    async fn test_empty_store_backfill() {
        let store: InMemoryEventStore = InMemoryEventStore::new();
        let mut processor = ProjectionProcessor::new(Vec::new());
        processor.register(Arc::new(CountingProjection::default()));

        let report = processor.backfill(&store).await.unwrap();

        assert_eq!(report, BackfillReport::default());
        assert_eq!(processor.projection_count(), 1);
    }

    #[tokio::test]
    async fn test_multiple_projections() {
        let (store, _) = store_with_orders(1).await;
        let first = CountingProjection::default();
        let second = CountingProjection::default();
        let count1 = Arc::clone(&first.count);
        let count2 = Arc::clone(&second.count);
        let processor = ProjectionProcessor::new(vec![Arc::new(first), Arc::new(second)]);

        let report = processor.backfill(&store).await.unwrap();

        assert_eq!(report.events_read, 2);
        assert_eq!(report.applied, 4);
        assert_eq!(*count1.read().await, 2);
        assert_eq!(*count2.read().await, 2);
    }

    #[tokio::test]
    async fn test_backfill_continues_past_an_undecodable_event() {
        let store: InMemoryEventStore = InMemoryEventStore::new();
        let broken = AggregateId::new();
        let garbage = NewEvent::new(broken, "Order", "OrderShipped", serde_json::json!("garbage"));
        store.append(garbage, Version::initial()).await.unwrap();
        let good = AggregateId::new();
        append(
            &store,
            good,
            OrderEvent::order_created(
                good,
                "Ada",
                AggregateId::new(),
                "Widget",
                1,
                domain::Money::from_cents(100),
            ),
        )
        .await;
        let view = OrderSnapshotView::new();
        let processor = ProjectionProcessor::new(vec![Arc::new(view.clone())]);

        let report = processor.backfill(&store).await.unwrap();

        assert_eq!(report.events_read, 2);
        assert_eq!(report.applied, 1);
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(
            &report.failed[0].kind,
            crate::GapKind::Skipped { aggregate_id, event_type, .. }
                if *aggregate_id == broken && event_type == "OrderShipped"
        ));
        assert_eq!(view.get(good).await.unwrap().status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_backfill_kind_reads_only_that_kind() {
        let (store, _) = store_with_orders(2).await;
        let stock = NewEvent::new(
            AggregateId::new(),
            "Inventory",
            "InventoryItemCreated",
            serde_json::json!({}),
        );
        store.append(stock, Version::initial()).await.unwrap();
        let counting = CountingProjection::default();
        let count_ref = Arc::clone(&counting.count);
        let processor = ProjectionProcessor::new(vec![Arc::new(counting)]);

        let orders = processor
            .backfill_kind(&store, AggregateKind::Order)
            .await
            .unwrap();
        let inventory = processor
            .backfill_kind(&store, AggregateKind::Inventory)
            .await
            .unwrap();

        assert_eq!(orders.events_read, 4);
        assert_eq!(inventory.events_read, 1);
        assert_eq!(*count_ref.read().await, 5);
    }
}
