//! The execution record returned to the caller of a saga.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::definition::SagaAction;

/// Outcome of one log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Completed,
    Failed,
    Compensated,
}

/// A single saga log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaLogEntry {
    /// 1-based position in the log.
    pub step: usize,
    pub action: SagaAction,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Ordered saga log. Ephemeral: it is returned, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SagaLog {
    entries: Vec<SagaLogEntry>,
}

impl SagaLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn completed(&mut self, action: SagaAction) {
        self.push(action, StepStatus::Completed, None);
    }

    pub(crate) fn failed(&mut self, action: SagaAction, error: impl ToString) {
        self.push(action, StepStatus::Failed, Some(error.to_string()));
    }

    pub(crate) fn compensated(&mut self, action: SagaAction) {
        self.push(action, StepStatus::Compensated, None);
    }

    fn push(&mut self, action: SagaAction, status: StepStatus, error: Option<String>) {
        self.entries.push(SagaLogEntry {
            step: self.entries.len() + 1,
            action,
            status,
            error,
            timestamp: Utc::now(),
        });
    }

    pub fn entries(&self) -> &[SagaLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&SagaLogEntry> {
        self.entries.last()
    }

    /// Returns `(action, status)` pairs, handy for asserting on the shape.
    pub fn summary(&self) -> Vec<(SagaAction, StepStatus)> {
        self.entries.iter().map(|e| (e.action, e.status)).collect()
    }
}
