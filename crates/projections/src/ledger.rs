//! Applied-event ledger shared by the views.

use std::collections::HashSet;

use common::AggregateId;
use event_store::{EventEnvelope, Version};

/// Remembers which `(aggregate_id, version)` pairs a view has applied.
#[derive(Debug, Default, Clone)]
pub struct AppliedLedger {
    applied: HashSet<(AggregateId, Version)>,
}

impl AppliedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, envelope: &EventEnvelope) -> bool {
        self.applied.contains(&envelope.key())
    }

    /// Records the event; returns false if it was already recorded.
    pub fn record(&mut self, envelope: &EventEnvelope) -> bool {
        self.applied.insert(envelope.key())
    }

    pub fn len(&self) -> usize {
        self.applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }

    pub fn clear(&mut self) {
        self.applied.clear();
    }
}
