use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, NewEvent, Result, RowProjector, Version,
    read_model::NoReadModel,
    store::{EventStore, EventStream, ReadModelStore, validate_new_event},
};

struct Inner<P: RowProjector> {
    /// Commit order across all aggregates.
    log: Vec<EventEnvelope>,
    /// Indices into `log` per aggregate, in version order.
    streams: HashMap<AggregateId, Vec<usize>>,
    rows: HashMap<AggregateId, P::Row>,
}

impl<P: RowProjector> Default for Inner<P> {
    fn default() -> Self {
        Self {
            log: Vec::new(),
            streams: HashMap::new(),
            rows: HashMap::new(),
        }
    }
}

impl<P: RowProjector> Inner<P> {
    fn current_version(&self, aggregate_id: AggregateId) -> Version {
        self.streams
            .get(&aggregate_id)
            .map(|indices| Version::new(indices.len() as i64))
            .unwrap_or_default()
    }
}

/// In-memory event store for tests and single-process deployments.
///
/// One lock guards the log and the read-model rows, so an append and its
/// row update are observed together or not at all.
pub struct InMemoryEventStore<P: RowProjector = NoReadModel> {
    inner: Arc<RwLock<Inner<P>>>,
    _projector: PhantomData<fn() -> P>,
}

impl<P: RowProjector> Clone for InMemoryEventStore<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _projector: PhantomData,
        }
    }
}

impl<P: RowProjector> Default for InMemoryEventStore<P> {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            _projector: PhantomData,
        }
    }
}

impl<P: RowProjector> InMemoryEventStore<P> {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.inner.read().await.log.len()
    }
}

#[async_trait]
impl<P: RowProjector> EventStore for InMemoryEventStore<P> {
    async fn append(&self, event: NewEvent, expected_version: Version) -> Result<EventEnvelope> {
        validate_new_event(&event, expected_version)?;

        let aggregate_id = event.aggregate_id;
        let mut inner = self.inner.write().await;

        let actual = inner.current_version(aggregate_id);
        if actual != expected_version {
            metrics::counter!("event_store_conflicts_total").increment(1);
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }

        let envelope = event.into_envelope(expected_version.next());

        // Project before mutating anything so a rejected row leaves no trace.
        let current_row = inner.rows.get(&aggregate_id).cloned();
        let next_row = P::project(current_row, &envelope)?;

        let index = inner.log.len();
        inner.log.push(envelope.clone());
        inner.streams.entry(aggregate_id).or_default().push(index);
        if let Some(row) = next_row {
            inner.rows.insert(aggregate_id, row);
        }

        metrics::counter!("event_store_appends_total").increment(1);
        Ok(envelope)
    }

    async fn load_events(&self, aggregate_id: AggregateId) -> Result<Vec<EventEnvelope>> {
        let inner = self.inner.read().await;
        let events = inner
            .streams
            .get(&aggregate_id)
            .map(|indices| indices.iter().map(|&i| inner.log[i].clone()).collect())
            .unwrap_or_default();
        Ok(events)
    }

    async fn aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let inner = self.inner.read().await;
        Ok(inner
            .streams
            .get(&aggregate_id)
            .map(|indices| Version::new(indices.len() as i64)))
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::stream;

        let events = self.inner.read().await.log.clone();
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }
}

#[async_trait]
impl<P: RowProjector> ReadModelStore for InMemoryEventStore<P> {
    type Row = P::Row;

    async fn get_row(&self, aggregate_id: AggregateId) -> Result<Option<P::Row>> {
        Ok(self.inner.read().await.rows.get(&aggregate_id).cloned())
    }

    async fn list_rows(&self) -> Result<Vec<P::Row>> {
        Ok(self.inner.read().await.rows.values().cloned().collect())
    }
}
