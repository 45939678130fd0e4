//! Command handling infrastructure.

use std::marker::PhantomData;
use std::sync::Arc;

use common::AggregateId;
use event_store::{EventEnvelope, EventPublisher, EventStore, NewEvent, NoopPublisher, Version};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new event.
    pub aggregate: A,

    /// The event that was decided and persisted.
    pub event: A::Event,

    /// The persisted record, as published.
    pub envelope: EventEnvelope,

    /// The new version of the aggregate after the command.
    pub new_version: Version,
}

/// Trait for commands that can be executed against an aggregate.
///
/// Commands represent an intention to perform an action. They may be rejected
/// if the aggregate's current state doesn't allow the action.
pub trait Command: Send + Sync {
    /// The type of aggregate this command targets.
    type Aggregate: Aggregate;

    /// Returns the ID of the aggregate this command targets.
    fn aggregate_id(&self) -> AggregateId;
}

/// Handler for executing commands against aggregates.
///
/// The handler:
/// 1. Replays the aggregate from its events
/// 2. Runs the decision to produce exactly one event
/// 3. Appends it with `expected_version` set to the replayed version
/// 4. Publishes the committed event
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    publisher: Arc<dyn EventPublisher>,
    _phantom: PhantomData<fn() -> A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    /// Creates a handler that publishes nowhere.
    pub fn new(store: S) -> Self {
        Self::with_publisher(store, Arc::new(NoopPublisher))
    }

    /// Creates a handler that publishes every committed event.
    pub fn with_publisher(store: S, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            store,
            publisher,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Replays an aggregate from the event store.
    ///
    /// If the aggregate doesn't exist, returns a default instance at version 0.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let events = self.store.load_events(aggregate_id).await?;

        let mut aggregate = A::default();
        for envelope in events {
            let event: A::Event = serde_json::from_value(envelope.payload)?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }

        Ok(aggregate)
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        Ok(aggregate.id().is_some().then_some(aggregate))
    }

    /// Executes a command and persists the resulting event.
    ///
    /// The decision receives the replayed state and returns exactly one event
    /// or a business error. A rejected decision leaves the store untouched.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        decide: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<A::Event, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut aggregate = self.load(aggregate_id).await?;
        let current_version = aggregate.version();

        let event = match decide(&aggregate) {
            Ok(event) => event,
            Err(e) => {
                metrics::counter!("domain_commands_rejected_total", "aggregate" => A::aggregate_type())
                    .increment(1);
                return Err(e.into());
            }
        };

        let new_event = NewEvent::from_payload(
            aggregate_id,
            A::aggregate_type(),
            event.event_type(),
            &event,
        )?;
        let envelope = self.store.append(new_event, current_version).await?;

        metrics::counter!("domain_commands_total", "aggregate" => A::aggregate_type()).increment(1);
        self.publisher.publish(&envelope);

        aggregate.apply(event.clone());
        aggregate.set_version(envelope.version);

        Ok(CommandResult {
            aggregate,
            event,
            new_version: envelope.version,
            envelope,
        })
    }

    /// Executes a command, reloading and re-deciding on concurrency conflicts.
    ///
    /// Makes at most `max_attempts` attempts. Business errors are returned
    /// immediately; only `ConcurrencyConflict` triggers another attempt.
    pub async fn execute_with_retry<F>(
        &self,
        aggregate_id: AggregateId,
        max_attempts: u32,
        decide: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&A) -> Result<A::Event, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut attempt = 1;
        loop {
            match self.execute(aggregate_id, &decide).await {
                Err(e) if e.is_concurrency_conflict() && attempt < max_attempts => {
                    tracing::debug!(
                        %aggregate_id,
                        attempt,
                        aggregate_type = A::aggregate_type(),
                        "concurrency conflict, reloading"
                    );
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
