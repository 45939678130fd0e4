//! Saga descriptors: the ordered steps of a saga as plain data.
//!
//! A definition is interpreted by the [`SagaCoordinator`](crate::SagaCoordinator).
//! Steps come in three kinds:
//!
//! ```text
//! Compensable* ──► Pivot? ──► Retriable*
//! ```
//!
//! Compensable steps can be undone. The pivot is the point of no return: once
//! it succeeds the saga must complete forward, so everything after it is
//! retried instead of compensated.

use serde::{Deserialize, Serialize};

use crate::error::SagaError;

/// Default number of attempts for the confirm step.
pub const DEFAULT_CONFIRM_ATTEMPTS: u32 = 3;

/// A remote command the saga can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SagaAction {
    CreateOrder,
    ReserveInventory,
    ConfirmOrder,
    CancelOrder,
    ReleaseInventory,
}

impl SagaAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaAction::CreateOrder => "CreateOrder",
            SagaAction::ReserveInventory => "ReserveInventory",
            SagaAction::ConfirmOrder => "ConfirmOrder",
            SagaAction::CancelOrder => "CancelOrder",
            SagaAction::ReleaseInventory => "ReleaseInventory",
        }
    }
}

impl std::fmt::Display for SagaAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a step behaves on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Undone by the given action when a later step fails.
    Compensable(SagaAction),
    /// Point of no return; failure compensates earlier steps, success commits
    /// the saga to completing forward.
    Pivot,
    /// Retried up to `attempts` times, never compensated.
    Retriable { attempts: u32 },
}

/// One step of a saga.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SagaStep {
    pub action: SagaAction,
    pub kind: StepKind,
}

impl SagaStep {
    pub fn compensable(action: SagaAction, compensation: SagaAction) -> Self {
        Self {
            action,
            kind: StepKind::Compensable(compensation),
        }
    }

    pub fn pivot(action: SagaAction) -> Self {
        Self {
            action,
            kind: StepKind::Pivot,
        }
    }

    pub fn retriable(action: SagaAction, attempts: u32) -> Self {
        Self {
            action,
            kind: StepKind::Retriable { attempts },
        }
    }

    /// Returns the compensating action, if this step has one.
    pub fn compensation(&self) -> Option<SagaAction> {
        match self.kind {
            StepKind::Compensable(action) => Some(action),
            _ => None,
        }
    }
}

/// An ordered, validated list of saga steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SagaDefinition {
    name: &'static str,
    steps: Vec<SagaStep>,
}

impl SagaDefinition {
    /// Builds a definition, checking that steps follow
    /// `Compensable* Pivot? Retriable*` and that retriable steps get at
    /// least one attempt.
    pub fn new(name: &'static str, steps: Vec<SagaStep>) -> Result<Self, SagaError> {
        if steps.is_empty() {
            return Err(SagaError::Validation(format!("saga {name} has no steps")));
        }

        let mut past_pivot = false;
        let mut retriable_seen = false;
        for step in &steps {
            match step.kind {
                StepKind::Compensable(_) if past_pivot || retriable_seen => {
                    return Err(SagaError::Validation(format!(
                        "saga {name}: compensable step {} after the pivot",
                        step.action
                    )));
                }
                StepKind::Compensable(_) => {}
                StepKind::Pivot if past_pivot || retriable_seen => {
                    return Err(SagaError::Validation(format!(
                        "saga {name}: pivot {} must be the only pivot and precede retriable steps",
                        step.action
                    )));
                }
                StepKind::Pivot => past_pivot = true,
                StepKind::Retriable { attempts: 0 } => {
                    return Err(SagaError::Validation(format!(
                        "saga {name}: retriable step {} needs at least one attempt",
                        step.action
                    )));
                }
                StepKind::Retriable { .. } => retriable_seen = true,
            }
        }

        Ok(Self { name, steps })
    }

    /// The order placement saga:
    ///
    /// 1. `CreateOrder`, compensated by `CancelOrder`
    /// 2. `ReserveInventory`, the pivot
    /// 3. `ConfirmOrder`, retried
    pub fn place_order() -> Self {
        Self {
            name: "PlaceOrder",
            steps: vec![
                SagaStep::compensable(SagaAction::CreateOrder, SagaAction::CancelOrder),
                SagaStep::pivot(SagaAction::ReserveInventory),
                SagaStep::retriable(SagaAction::ConfirmOrder, DEFAULT_CONFIRM_ATTEMPTS),
            ],
        }
    }

    /// Returns a copy where every retriable step gets `attempts` attempts
    /// (at least one).
    pub fn with_retriable_attempts(mut self, attempts: u32) -> Self {
        let attempts = attempts.max(1);
        for step in &mut self.steps {
            if let StepKind::Retriable { attempts: a } = &mut step.kind {
                *a = attempts;
            }
        }
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn steps(&self) -> &[SagaStep] {
        &self.steps
    }
}
