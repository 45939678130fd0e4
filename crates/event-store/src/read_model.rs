use serde::{Serialize, de::DeserializeOwned};

use crate::{EventEnvelope, Result};

/// Folds an appended event into the denormalized row of its aggregate.
///
/// Stores call the projector inside the append's atomic unit: if it fails,
/// neither the event nor the row is written, so the row is never stale
/// relative to the aggregate's own log.
pub trait RowProjector: Send + Sync + 'static {
    /// The row type. Postgres stores persist it as JSONB.
    type Row: Clone + Send + Sync + Serialize + DeserializeOwned + 'static;

    /// Name of the read model, used to partition rows in shared storage.
    fn model() -> &'static str;

    /// Derives the next row from the current one (`None` before the first
    /// event) and the event that was just stamped with its version.
    ///
    /// Returning `Ok(None)` leaves the stored row untouched.
    fn project(current: Option<Self::Row>, event: &EventEnvelope) -> Result<Option<Self::Row>>;
}

/// Projector for stores that keep no read model.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReadModel;

impl RowProjector for NoReadModel {
    type Row = ();

    fn model() -> &'static str {
        "none"
    }

    fn project(_current: Option<()>, _event: &EventEnvelope) -> Result<Option<()>> {
        Ok(None)
    }
}
