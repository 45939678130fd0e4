use tokio::sync::broadcast;

use crate::EventEnvelope;

/// Broadcasts committed events to asynchronous consumers.
///
/// Publishing happens after the append has committed and never fails the
/// command that produced the event. Delivery is at-least-once at best:
/// consumers must be idempotent and must tolerate gaps.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: &EventEnvelope);
}

/// Publisher backed by a bounded `tokio::sync::broadcast` channel.
///
/// Receivers that fall more than `capacity` events behind lose the oldest
/// messages and observe `RecvError::Lagged`.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<EventEnvelope>,
}

impl BroadcastPublisher {
    /// Creates a publisher whose channel holds up to `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Opens a new receiver that sees every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, event: &EventEnvelope) {
        match self.sender.send(event.clone()) {
            Ok(receivers) => {
                metrics::counter!("event_publisher_published_total").increment(1);
                tracing::trace!(
                    event_type = %event.event_type,
                    aggregate_id = %event.aggregate_id,
                    receivers,
                    "event published"
                );
            }
            Err(_) => {
                tracing::debug!(
                    event_type = %event.event_type,
                    aggregate_id = %event.aggregate_id,
                    "no subscribers, event not delivered"
                );
            }
        }
    }
}

/// Publisher that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _event: &EventEnvelope) {}
}

impl<P: EventPublisher + ?Sized> EventPublisher for std::sync::Arc<P> {
    fn publish(&self, event: &EventEnvelope) {
        (**self).publish(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AggregateId, NewEvent, Version};

    fn event(version: i64) -> EventEnvelope {
        NewEvent::new(AggregateId::new(), "Order", "OrderCreated", serde_json::json!({}))
            .into_envelope(Version::new(version))
    }

    #[tokio::test]
    async fn test_subscribers_receive_published_events() {
        let publisher = BroadcastPublisher::new(8);
        let mut rx1 = publisher.subscribe();
        let mut rx2 = publisher.subscribe();

        let sent = event(1);
        publisher.publish(&sent);

        assert_eq!(rx1.recv().await.unwrap(), sent);
        assert_eq!(rx2.recv().await.unwrap(), sent);
    }

    #[tokio::test]
    async fn test_publishing_without_subscribers_is_harmless() {
        let publisher = BroadcastPublisher::new(8);
        assert_eq!(publisher.receiver_count(), 0);
        publisher.publish(&event(1));
    }

    #[tokio::test]
    async fn test_slow_receiver_observes_lag() {
        let publisher = BroadcastPublisher::new(2);
        let mut rx = publisher.subscribe();

        for v in 1..=4 {
            publisher.publish(&event(v));
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(2))
        ));
        assert_eq!(rx.recv().await.unwrap().version, Version::new(3));
    }
}
