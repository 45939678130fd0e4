//! Background task that feeds published events into projections.
//!
//! The subscriber owns a broadcast receiver and applies every event to
//! every registered projection. A projection that fails on an event does
//! not stop the task: the event is parked and retried after later events
//! arrive (an out-of-order confirm usually succeeds once its create shows
//! up). Events that still fail after `max_attempts`, events dropped because
//! the receiver lagged, and events still parked at shutdown become
//! [`GapRecord`]s, to be repaired by a backfill from the store.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::{EventEnvelope, Version};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{RwLock, broadcast, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::error::ProjectionError;
use crate::projection::{Applied, Projection};

/// Tuning for [`ProjectionSubscriber`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberConfig {
    /// Attempts per (projection, event), the first delivery included.
    pub max_attempts: u32,
    /// Parked events held at most; overflow becomes a gap right away.
    pub retry_capacity: usize,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_capacity: 1024,
        }
    }
}

impl SubscriberConfig {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_retry_capacity(mut self, capacity: usize) -> Self {
        self.retry_capacity = capacity;
        self
    }
}

/// Why an event never made it into a projection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GapKind {
    /// The projection kept rejecting the event.
    Skipped {
        projection: &'static str,
        aggregate_id: AggregateId,
        version: Version,
        event_type: String,
        attempts: u32,
        reason: String,
    },
    /// The receiver fell behind and the channel dropped `missed` events.
    Lagged { missed: u64 },
}

/// A hole in the analytics views, to be filled by a backfill.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GapRecord {
    #[serde(flatten)]
    pub kind: GapKind,
    pub recorded_at: DateTime<Utc>,
}

impl GapRecord {
    pub(crate) fn new(kind: GapKind) -> Self {
        metrics::counter!("projections_gaps_total").increment(1);
        Self {
            kind,
            recorded_at: Utc::now(),
        }
    }
}

/// Subscribes projections to a stream of published events.
pub struct ProjectionSubscriber {
    projections: Vec<Arc<dyn Projection>>,
    config: SubscriberConfig,
}

impl ProjectionSubscriber {
    pub fn new(projections: Vec<Arc<dyn Projection>>) -> Self {
        Self::with_config(projections, SubscriberConfig::default())
    }

    pub fn with_config(projections: Vec<Arc<dyn Projection>>, config: SubscriberConfig) -> Self {
        Self {
            projections,
            config,
        }
    }

    /// Spawns the subscriber task on the current tokio runtime.
    pub fn start(self, receiver: broadcast::Receiver<EventEnvelope>) -> SubscriberHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let gaps = Arc::new(RwLock::new(Vec::new()));

        let worker = Worker {
            projections: self.projections,
            config: self.config,
            parked: VecDeque::new(),
            gaps: Arc::clone(&gaps),
        };
        let task = tokio::spawn(
            worker
                .run(receiver, shutdown_rx)
                .instrument(tracing::info_span!("projection_subscriber")),
        );

        SubscriberHandle {
            shutdown: shutdown_tx,
            task,
            gaps,
        }
    }
}

/// Controls a running [`ProjectionSubscriber`].
pub struct SubscriberHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    gaps: Arc<RwLock<Vec<GapRecord>>>,
}

impl SubscriberHandle {
    /// Gaps recorded so far.
    pub async fn gaps(&self) -> Vec<GapRecord> {
        self.gaps.read().await.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signals the task to stop, waits for it, and returns every gap it
    /// recorded, including events still parked at shutdown.
    pub async fn stop(self) -> Vec<GapRecord> {
        // The task may already be gone if the channel closed.
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "projection subscriber task failed");
        }
        self.gaps.read().await.clone()
    }
}

struct Parked {
    projection: Arc<dyn Projection>,
    event: EventEnvelope,
    attempts: u32,
}

struct Worker {
    projections: Vec<Arc<dyn Projection>>,
    config: SubscriberConfig,
    parked: VecDeque<Parked>,
    gaps: Arc<RwLock<Vec<GapRecord>>>,
}

impl Worker {
    async fn run(
        mut self,
        mut receiver: broadcast::Receiver<EventEnvelope>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tracing::info!(
            projections = self.projections.len(),
            "projection subscriber started"
        );

        while !*shutdown.borrow() {
            tokio::select! {
                received = receiver.recv() => match received {
                    Ok(event) => {
                        let earlier = std::mem::take(&mut self.parked);
                        self.deliver(&event).await;
                        self.retry(earlier).await;
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "subscriber lagged, events dropped");
                        self.record_gap(GapKind::Lagged { missed }).await;
                    }
                    Err(RecvError::Closed) => {
                        tracing::info!("event channel closed");
                        break;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("shutdown signal received");
                        break;
                    }
                }
            }
        }

        self.abandon_parked().await;
        tracing::info!("projection subscriber stopped");
    }

    async fn deliver(&mut self, event: &EventEnvelope) {
        for index in 0..self.projections.len() {
            let projection = Arc::clone(&self.projections[index]);
            if let Err(e) = apply(projection.as_ref(), event).await {
                self.park(projection, event.clone(), 1, e).await;
            }
        }
    }

    /// Gives each event parked before the latest delivery one more attempt,
    /// oldest first.
    async fn retry(&mut self, batch: VecDeque<Parked>) {
        for parked in batch {
            if let Err(e) = apply(parked.projection.as_ref(), &parked.event).await {
                self.park(parked.projection, parked.event, parked.attempts + 1, e)
                    .await;
            } else {
                tracing::debug!(
                    projection = parked.projection.name(),
                    event_type = %parked.event.event_type,
                    attempts = parked.attempts + 1,
                    "parked event applied"
                );
            }
        }
    }

    async fn park(
        &mut self,
        projection: Arc<dyn Projection>,
        event: EventEnvelope,
        attempts: u32,
        error: ProjectionError,
    ) {
        tracing::warn!(
            projection = projection.name(),
            aggregate_id = %event.aggregate_id,
            version = %event.version,
            event_type = %event.event_type,
            attempts,
            error = %error,
            "projection failed to apply event"
        );
        metrics::counter!("projections_failures_total", "projection" => projection.name())
            .increment(1);

        let exhausted = attempts >= self.config.max_attempts || !error.is_retryable();
        if exhausted || self.parked.len() >= self.config.retry_capacity {
            self.record_gap(skipped(projection.as_ref(), &event, attempts, &error))
                .await;
            return;
        }
        self.parked.push_back(Parked {
            projection,
            event,
            attempts,
        });
    }

    async fn abandon_parked(&mut self) {
        let parked = std::mem::take(&mut self.parked);
        for p in parked {
            let reason = "subscriber stopped before the event applied";
            self.record_gap(GapKind::Skipped {
                projection: p.projection.name(),
                aggregate_id: p.event.aggregate_id,
                version: p.event.version,
                event_type: p.event.event_type.clone(),
                attempts: p.attempts,
                reason: reason.to_string(),
            })
            .await;
        }
    }

    async fn record_gap(&self, kind: GapKind) {
        tracing::error!(gap = ?kind, "analytics gap recorded, backfill required");
        self.gaps.write().await.push(GapRecord::new(kind));
    }
}

/// Applies one event to one projection and counts the outcome.
async fn apply(projection: &dyn Projection, event: &EventEnvelope) -> crate::Result<()> {
    let name = projection.name();
    match projection.handle(event).await? {
        Applied::Changed => {
            metrics::counter!("projections_events_applied_total", "projection" => name)
                .increment(1);
        }
        Applied::Duplicate => {
            tracing::debug!(
                projection = name,
                aggregate_id = %event.aggregate_id,
                version = %event.version,
                "duplicate event skipped"
            );
            metrics::counter!("projections_duplicates_total", "projection" => name).increment(1);
        }
        Applied::Ignored => {}
    }
    Ok(())
}

pub(crate) fn skipped(
    projection: &dyn Projection,
    event: &EventEnvelope,
    attempts: u32,
    error: &ProjectionError,
) -> GapKind {
    GapKind::Skipped {
        projection: projection.name(),
        aggregate_id: event.aggregate_id,
        version: event.version,
        event_type: event.event_type.clone(),
        attempts,
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::OrderSnapshotView;
    use crate::views::testing::{confirmed, created};
    use std::time::Duration;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_out_of_order_confirm_is_retried() {
        let view = OrderSnapshotView::new();
        let (tx, rx) = broadcast::channel(16);
        let handle = ProjectionSubscriber::new(vec![Arc::new(view.clone())]).start(rx);
        let order_id = AggregateId::new();

        tx.send(confirmed(order_id)).unwrap();
        tx.send(created(order_id, "Ada", AggregateId::new(), 1, 100))
            .unwrap();
        settle().await;

        let snapshot = view.get(order_id).await.unwrap();
        assert_eq!(snapshot.status, domain::OrderStatus::Confirmed);
        assert!(handle.stop().await.is_empty());
    }

    #[tokio::test]
    async fn test_next_event_gets_the_retry_before_attempts_run_out() {
        let view = OrderSnapshotView::new();
        let (tx, rx) = broadcast::channel(16);
        let config = SubscriberConfig::default().with_max_attempts(2);
        let handle =
            ProjectionSubscriber::with_config(vec![Arc::new(view.clone())], config).start(rx);
        let order_id = AggregateId::new();

        tx.send(confirmed(order_id)).unwrap();
        settle().await;
        assert!(handle.gaps().await.is_empty());

        tx.send(created(order_id, "Ada", AggregateId::new(), 1, 100))
            .unwrap();
        settle().await;

        let snapshot = view.get(order_id).await.unwrap();
        assert_eq!(snapshot.status, domain::OrderStatus::Confirmed);
        assert!(handle.stop().await.is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_retries_become_a_gap() {
        let view = OrderSnapshotView::new();
        let (tx, rx) = broadcast::channel(16);
        let config = SubscriberConfig::default().with_max_attempts(2);
        let handle =
            ProjectionSubscriber::with_config(vec![Arc::new(view.clone())], config).start(rx);
        let orphan = AggregateId::new();

        tx.send(confirmed(orphan)).unwrap();
        tx.send(created(AggregateId::new(), "Ada", AggregateId::new(), 1, 100))
            .unwrap();
        settle().await;

        let gaps = handle.gaps().await;
        assert_eq!(gaps.len(), 1);
        assert!(matches!(
            &gaps[0].kind,
            GapKind::Skipped { aggregate_id, attempts: 2, .. } if *aggregate_id == orphan
        ));
        assert!(handle.is_running());
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_parked_events_are_reported_at_stop() {
        let view = OrderSnapshotView::new();
        let (tx, rx) = broadcast::channel(16);
        let handle = ProjectionSubscriber::new(vec![Arc::new(view.clone())]).start(rx);

        tx.send(confirmed(AggregateId::new())).unwrap();
        settle().await;
        assert!(handle.gaps().await.is_empty());

        let gaps = handle.stop().await;
        assert_eq!(gaps.len(), 1);
    }

    #[tokio::test]
    async fn test_lag_is_recorded_as_gap() {
        let view = OrderSnapshotView::new();
        let (tx, rx) = broadcast::channel(2);
        for _ in 0..5 {
            tx.send(created(AggregateId::new(), "Ada", AggregateId::new(), 1, 100))
                .unwrap();
        }

        let handle = ProjectionSubscriber::new(vec![Arc::new(view.clone())]).start(rx);
        settle().await;

        let gaps = handle.stop().await;
        assert_eq!(
            gaps.iter().map(|g| g.kind.clone()).collect::<Vec<_>>(),
            vec![GapKind::Lagged { missed: 3 }]
        );
        assert_eq!(view.count().await, 2);
    }

    #[tokio::test]
    async fn test_closed_channel_ends_the_task() {
        let (tx, rx) = broadcast::channel::<EventEnvelope>(4);
        let handle = ProjectionSubscriber::new(Vec::new()).start(rx);

        drop(tx);
        settle().await;

        assert!(!handle.is_running());
        assert!(handle.stop().await.is_empty());
    }
}
