use common::AggregateId;
use criterion::{Criterion, criterion_group, criterion_main};
use event_store::{
    AppendOptions, EventEnvelope, EventQuery, InMemoryEventStore, StreamAppend, Version,
    store::EventStore,
};

fn make_event(aggregate_id: AggregateId, aggregate_type: &str, event_type: &str, version: i64) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(aggregate_id)
        .aggregate_type(aggregate_type)
        .event_type(event_type)
        .version(Version::new(version))
        .payload_raw(serde_json::json!({
            "type": event_type,
            "data": { "id": aggregate_id.to_string() }
        }))
        .build()
        .unwrap()
}

fn bench_append_single_event(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_store/append_single_event", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryEventStore::new();
                let event = make_event(AggregateId::new(), "Appointment", "AppointmentBooked", 1);
                store
                    .append(vec![event], AppendOptions::expect_new())
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_settlement_shaped_commit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_store/commit_three_streams", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryEventStore::new();
                let cart = AggregateId::new();
                store
                    .append(
                        vec![make_event(cart, "Cart", "CartOpened", 1)],
                        AppendOptions::expect_new(),
                    )
                    .await
                    .unwrap();

                store
                    .commit(vec![
                        StreamAppend::new(
                            vec![make_event(cart, "Cart", "CartPaid", 2)],
                            AppendOptions::expect_version(Version::first()),
                        ),
                        StreamAppend::new(
                            vec![make_event(AggregateId::new(), "Billing", "BillingCreated", 1)],
                            AppendOptions::expect_new(),
                        ),
                        StreamAppend::new(
                            vec![make_event(AggregateId::new(), "PatientCartRegistry", "OpenCartReleased", 2)],
                            AppendOptions::new(),
                        ),
                    ])
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_get_events_for_aggregate(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let agg_id = AggregateId::new();

    rt.block_on(async {
        let events: Vec<EventEnvelope> = (1..=100)
            .map(|v| make_event(agg_id, "Cart", "LinesAdded", v))
            .collect();
        store.append(events, AppendOptions::new()).await.unwrap();
    });

    c.bench_function("event_store/get_events_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                store.get_events_for_aggregate(agg_id).await.unwrap();
            });
        });
    });
}

fn bench_query_by_aggregate_type(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();

    rt.block_on(async {
        for i in 0..500 {
            let aggregate_type = if i % 2 == 0 { "Appointment" } else { "Cart" };
            store
                .append(
                    vec![make_event(AggregateId::new(), aggregate_type, "Opened", 1)],
                    AppendOptions::new(),
                )
                .await
                .unwrap();
        }
    });

    c.bench_function("event_store/query_250_of_500", |b| {
        b.iter(|| {
            rt.block_on(async {
                let events = store
                    .query_events(EventQuery::for_aggregate_type("Appointment"))
                    .await
                    .unwrap();
                assert_eq!(events.len(), 250);
            });
        });
    });
}

fn bench_stream_all_events(c: &mut Criterion) {
    use futures_util::StreamExt;

    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();

    rt.block_on(async {
        for _ in 0..10 {
            let agg_id = AggregateId::new();
            let events: Vec<EventEnvelope> = (1..=100)
                .map(|v| make_event(agg_id, "Appointment", "AppointmentRescheduled", v))
                .collect();
            store.append(events, AppendOptions::new()).await.unwrap();
        }
    });

    c.bench_function("event_store/stream_1000_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut stream = store.stream_all_events().await.unwrap();
                let mut count = 0;
                while let Some(result) = stream.next().await {
                    result.unwrap();
                    count += 1;
                }
                assert_eq!(count, 1000);
            });
        });
    });
}

criterion_group!(
    benches,
    bench_append_single_event,
    bench_settlement_shaped_commit,
    bench_get_events_for_aggregate,
    bench_query_by_aggregate_type,
    bench_stream_all_events,
);
criterion_main!(benches);
