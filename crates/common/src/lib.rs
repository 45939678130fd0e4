//! Identifiers shared by every crate in the fulfillment workspace.

mod types;

pub use types::{AggregateId, AggregateKind};
