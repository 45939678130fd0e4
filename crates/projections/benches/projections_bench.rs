use common::AggregateId;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{DomainEvent, Money, OrderEvent};
use event_store::{EventEnvelope, EventStore, InMemoryEventStore, NewEvent, Version};
use projections::{Projection, ProjectionProcessor, SalesAnalytics};

fn make_envelope(aggregate_id: AggregateId, version: i64, event: &OrderEvent) -> EventEnvelope {
    NewEvent::from_payload(aggregate_id, "Order", event.event_type(), event)
        .unwrap()
        .into_envelope(Version::new(version))
}

/// Populate a store with N orders, each created then confirmed or cancelled.
async fn populate_store(store: &InMemoryEventStore, n: usize) {
    let products: Vec<_> = (0..10).map(|_| AggregateId::new()).collect();
    for i in 0..n {
        let order_id = AggregateId::new();
        let created = OrderEvent::order_created(
            order_id,
            format!("Customer {}", i % 25),
            products[i % products.len()],
            "Widget",
            2,
            Money::from_cents(2000),
        );
        let settled = if i % 4 == 0 {
            OrderEvent::order_cancelled(order_id, "Insufficient inventory")
        } else {
            OrderEvent::order_confirmed(order_id)
        };

        for (expected, event) in [(0, &created), (1, &settled)] {
            let new_event =
                NewEvent::from_payload(order_id, "Order", event.event_type(), event).unwrap();
            store.append(new_event, Version::new(expected)).await.unwrap();
        }
    }
}

fn bench_backfill_100_orders(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store: InMemoryEventStore = InMemoryEventStore::new();
    rt.block_on(populate_store(&store, 100));

    c.bench_function("projections/backfill_200_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                let analytics = SalesAnalytics::new();
                let processor = ProjectionProcessor::new(analytics.projections());
                processor.backfill(&store).await.unwrap();
            });
        });
    });
}

fn bench_backfill_1000_orders(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store: InMemoryEventStore = InMemoryEventStore::new();
    rt.block_on(populate_store(&store, 1000));

    c.bench_function("projections/backfill_2000_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                let analytics = SalesAnalytics::new();
                let processor = ProjectionProcessor::new(analytics.projections());
                processor.backfill(&store).await.unwrap();
            });
        });
    });
}

fn bench_handle_duplicate(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let analytics = SalesAnalytics::new();
    let order_id = AggregateId::new();
    let event = make_envelope(
        order_id,
        1,
        &OrderEvent::order_created(
            order_id,
            "Ada",
            AggregateId::new(),
            "Widget",
            1,
            Money::from_cents(1000),
        ),
    );
    rt.block_on(analytics.customers.handle(&event)).unwrap();

    c.bench_function("projections/handle_duplicate", |b| {
        b.iter(|| {
            rt.block_on(analytics.customers.handle(&event)).unwrap();
        });
    });
}

fn bench_overview(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store: InMemoryEventStore = InMemoryEventStore::new();
    let analytics = SalesAnalytics::new();
    rt.block_on(async {
        populate_store(&store, 500).await;
        ProjectionProcessor::new(analytics.projections())
            .backfill(&store)
            .await
            .unwrap();
    });

    c.bench_function("projections/overview_500_orders", |b| {
        b.iter(|| {
            rt.block_on(analytics.overview());
        });
    });
}

criterion_group!(
    benches,
    bench_backfill_100_orders,
    bench_backfill_1000_orders,
    bench_handle_duplicate,
    bench_overview,
);
criterion_main!(benches);
