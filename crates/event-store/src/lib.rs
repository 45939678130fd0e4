//! Append-only, per-aggregate versioned event log.
//!
//! Every append is guarded by an expected version and folds the event into
//! the aggregate's read-model row in the same atomic unit. Committed events
//! are handed to an [`EventPublisher`] by the command layer.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod publisher;
pub mod read_model;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventId, NewEvent, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use publisher::{BroadcastPublisher, EventPublisher, NoopPublisher};
pub use read_model::{NoReadModel, RowProjector};
pub use store::{EventStore, EventStoreExt, EventStream, ReadModelStore};
