//! Core projection trait and position tracking.

use async_trait::async_trait;
use common::AggregateId;
use event_store::{EventEnvelope, Version};

use crate::Result;

/// What handling one event did to a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// First observation; the view changed.
    Changed,
    /// Already applied earlier; nothing changed.
    Duplicate,
    /// Not relevant to this projection.
    Ignored,
}

/// How far a projection has got.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    /// Distinct events applied since the last reset.
    pub applied: u64,
    /// Key of the most recently applied event.
    pub last: Option<(AggregateId, Version)>,
}

impl ProjectionPosition {
    pub(crate) fn record(&mut self, envelope: &EventEnvelope) {
        self.applied += 1;
        self.last = Some(envelope.key());
    }
}

/// A projection that folds published events into an analytics view.
///
/// `handle` must be idempotent: delivery is at-least-once, so the same
/// `(aggregate_id, version)` may arrive more than once and must only count
/// the first time. A failed `handle` leaves the view untouched.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Returns the name of this projection.
    fn name(&self) -> &'static str;

    /// Handles a single event.
    async fn handle(&self, event: &EventEnvelope) -> Result<Applied>;

    /// Returns the current position of this projection.
    async fn position(&self) -> ProjectionPosition;

    /// Resets the projection to its initial state.
    async fn reset(&self) -> Result<()>;
}
