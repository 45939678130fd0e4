//! Eventually-consistent analytics for the order fulfillment system.
//!
//! This crate is the asynchronous read side:
//! - [`Projection`] trait for folding published events into views
//! - four views (order snapshots, customer summaries, product popularity,
//!   daily sales) that deduplicate on `(aggregate_id, version)`
//! - [`ProjectionSubscriber`], a background task fed by the event publisher
//! - [`ProjectionProcessor`] for backfilling views from the event stores
//! - [`SalesAnalytics`] as the query facade over the views

pub mod analytics;
pub mod error;
pub mod ledger;
pub mod processor;
pub mod projection;
pub mod subscriber;
pub mod views;

pub use analytics::{SalesAnalytics, SalesOverview};
pub use error::{ProjectionError, Result};
pub use ledger::AppliedLedger;
pub use processor::{BackfillReport, ProjectionProcessor};
pub use projection::{Applied, Projection, ProjectionPosition};
pub use subscriber::{
    GapKind, GapRecord, ProjectionSubscriber, SubscriberConfig, SubscriberHandle,
};
pub use views::{
    CustomerSummary, CustomerSummaryView, DailySales, DailySalesView, OrderSnapshot,
    OrderSnapshotView, ProductPopularity, ProductPopularityView,
};
