use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AggregateId, EventEnvelope, EventStoreError, NewEvent, Result, Version};

/// A stream of events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

/// Core trait for event store implementations.
///
/// An event store is the append-only, per-aggregate versioned log that acts
/// as the system of record. All implementations must be thread-safe.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends one event at `expected_version + 1`.
    ///
    /// Fails with `ConcurrencyConflict` if the aggregate is no longer at
    /// `expected_version`. That check is the only coordination between
    /// concurrent writers; the store never retries on the caller's behalf.
    ///
    /// The aggregate's read-model row is updated in the same atomic unit.
    async fn append(&self, event: NewEvent, expected_version: Version) -> Result<EventEnvelope>;

    /// Retrieves all events for a specific aggregate, oldest first.
    ///
    /// An empty result means the aggregate does not exist.
    async fn load_events(&self, aggregate_id: AggregateId) -> Result<Vec<EventEnvelope>>;

    /// Gets the current version of an aggregate.
    ///
    /// Returns None if the aggregate doesn't exist.
    async fn aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;

    /// Streams every event in the store in commit order.
    async fn stream_all_events(&self) -> Result<EventStream>;
}

/// Extension trait providing convenience methods for event stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Checks if an aggregate exists (has any events).
    async fn aggregate_exists(&self, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.aggregate_version(aggregate_id).await?.is_some())
    }

    /// Collects the full log into memory.
    async fn load_all_events(&self) -> Result<Vec<EventEnvelope>> {
        use futures_util::TryStreamExt;

        self.stream_all_events().await?.try_collect().await
    }

    /// Streams the events of one aggregate type, in commit order.
    ///
    /// Stores that share a log with other services see only their own
    /// aggregates through this.
    async fn stream_events_of(&self, aggregate_type: &str) -> Result<EventStream> {
        use futures_util::{StreamExt, TryStreamExt, future};

        let aggregate_type = aggregate_type.to_string();
        let events = self
            .stream_all_events()
            .await?
            .try_filter(move |event| future::ready(event.aggregate_type == aggregate_type));
        Ok(events.boxed())
    }
}

// Blanket implementation for all EventStore implementations
impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Query access to the denormalized rows a store maintains next to its log.
#[async_trait]
pub trait ReadModelStore: Send + Sync {
    type Row: Send + Sync;

    /// Returns the current row for an aggregate, if any event was appended.
    async fn get_row(&self, aggregate_id: AggregateId) -> Result<Option<Self::Row>>;

    /// Returns every row of this store's read model.
    async fn list_rows(&self) -> Result<Vec<Self::Row>>;
}

/// Validates an event before anything is written.
pub fn validate_new_event(event: &NewEvent, expected_version: Version) -> Result<()> {
    if event.aggregate_type.trim().is_empty() {
        return Err(EventStoreError::InvalidEvent(
            "aggregate_type must not be empty".to_string(),
        ));
    }
    if event.event_type.trim().is_empty() {
        return Err(EventStoreError::InvalidEvent(
            "event_type must not be empty".to_string(),
        ));
    }
    if expected_version < Version::initial() {
        return Err(EventStoreError::InvalidEvent(format!(
            "expected version must not be negative, got {expected_version}"
        )));
    }
    Ok(())
}
