//! Feeds the event log to projections.

use event_store::EventStore;
use futures_util::StreamExt;
use tokio::sync::Mutex;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};

/// Delivers events from the store to registered projections.
///
/// Each projection's position is the log position of the last event it was
/// handed; a catch-up reads only the log after the slowest projection.
/// Catch-up runs are serialized, so concurrent callers never hand the same
/// event to a projection twice.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
    positions: Mutex<Vec<ProjectionPosition>>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            positions: Mutex::new(Vec::new()),
        }
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
        self.positions.get_mut().push(ProjectionPosition::zero());
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, projection: impl Projection + 'static) -> Self {
        self.register(Box::new(projection));
        self
    }

    /// Where each registered projection stands in the log.
    pub async fn positions(&self) -> Vec<(&'static str, ProjectionPosition)> {
        let positions = self.positions.lock().await;
        self.projections
            .iter()
            .map(|projection| projection.name())
            .zip(positions.iter().copied())
            .collect()
    }

    /// Reads the log past the slowest projection and delivers every event a
    /// projection has not seen.
    ///
    /// Returns the number of deliveries made.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let mut positions = self.positions.lock().await;
        let Some(from) = positions.iter().min().copied() else {
            return Ok(0);
        };

        let mut stream = self.store.stream_events_after(from.last_position).await?;
        let mut delivered: u64 = 0;

        while let Some(result) = stream.next().await {
            let logged = result?;

            for (projection, position) in self.projections.iter().zip(positions.iter_mut()) {
                if position.has_seen(logged.position) {
                    continue;
                }
                projection.handle(&logged.event).await?;
                *position = ProjectionPosition::at(logged.position);
                delivered += 1;
                metrics::counter!("projections_events_processed").increment(1);
            }
        }

        if delivered > 0 {
            tracing::debug!(from = %from, delivered, "catch-up complete");
        }
        Ok(delivered)
    }

    /// Resets every projection and replays the whole log.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<u64> {
        {
            let mut positions = self.positions.lock().await;
            for (projection, position) in self.projections.iter().zip(positions.iter_mut()) {
                tracing::info!(projection = projection.name(), "resetting projection");
                projection.reset().await?;
                *position = ProjectionPosition::zero();
            }
        }
        self.run_catch_up().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::AggregateId;
    use event_store::{
        AppendOptions, EventEnvelope, EventQuery, InMemoryEventStore, LoggedEventStream,
        StreamAppend, Version,
    };
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};

    #[derive(Clone, Default)]
    struct CountingProjection {
        handled: Arc<AtomicU64>,
    }

    impl CountingProjection {
        fn handled(&self) -> u64 {
            self.handled.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Projection for CountingProjection {
        fn name(&self) -> &'static str {
            "CountingProjection"
        }

        async fn handle(&self, _event: &EventEnvelope) -> Result<()> {
            self.handled.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn reset(&self) -> Result<()> {
            self.handled.store(0, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Records where each catch-up started reading.
    #[derive(Clone, Default)]
    struct RecordingStore {
        inner: InMemoryEventStore,
        reads_after: Arc<StdMutex<Vec<u64>>>,
    }

    #[async_trait]
    impl EventStore for RecordingStore {
        async fn commit(&self, appends: Vec<StreamAppend>) -> event_store::Result<Vec<Version>> {
            self.inner.commit(appends).await
        }

        async fn get_events_for_aggregate(
            &self,
            aggregate_id: AggregateId,
        ) -> event_store::Result<Vec<EventEnvelope>> {
            self.inner.get_events_for_aggregate(aggregate_id).await
        }

        async fn query_events(&self, query: EventQuery) -> event_store::Result<Vec<EventEnvelope>> {
            self.inner.query_events(query).await
        }

        async fn stream_events_after(&self, position: u64) -> event_store::Result<LoggedEventStream> {
            self.reads_after.lock().unwrap().push(position);
            self.inner.stream_events_after(position).await
        }

        async fn get_aggregate_version(
            &self,
            aggregate_id: AggregateId,
        ) -> event_store::Result<Option<Version>> {
            self.inner.get_aggregate_version(aggregate_id).await
        }
    }

    fn event(aggregate_id: AggregateId, version: i64) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("Test")
            .event_type("TestEvent")
            .version(Version::new(version))
            .payload_raw(serde_json::json!({"test": true}))
            .build()
            .unwrap()
    }

    async fn append_stream<S: EventStore>(store: &S, count: i64) {
        let id = AggregateId::new();
        let events = (1..=count).map(|v| event(id, v)).collect();
        store.append(events, AppendOptions::expect_new()).await.unwrap();
    }

    async fn store_with(count: i64) -> InMemoryEventStore {
        let store = InMemoryEventStore::new();
        if count > 0 {
            append_stream(&store, count).await;
        }
        store
    }

    #[tokio::test]
    async fn catch_up_delivers_each_event_once() {
        let projection = CountingProjection::default();
        let processor = ProjectionProcessor::new(store_with(3).await).with(projection.clone());

        assert_eq!(processor.run_catch_up().await.unwrap(), 3);
        assert_eq!(processor.run_catch_up().await.unwrap(), 0);
        assert_eq!(projection.handled(), 3);
        assert_eq!(
            processor.positions().await,
            vec![("CountingProjection", ProjectionPosition::at(3))]
        );
    }

    #[tokio::test]
    async fn catch_up_reads_only_past_the_slowest_projection() {
        let store = RecordingStore::default();
        append_stream(&store, 2).await;
        let projection = CountingProjection::default();
        let processor = ProjectionProcessor::new(store.clone()).with(projection.clone());

        processor.run_catch_up().await.unwrap();
        append_stream(&store, 3).await;
        assert_eq!(processor.run_catch_up().await.unwrap(), 3);
        processor.run_catch_up().await.unwrap();

        assert_eq!(*store.reads_after.lock().unwrap(), vec![0, 2, 5]);
        assert_eq!(projection.handled(), 5);
    }

    #[tokio::test]
    async fn late_projection_catches_up_alone() {
        let first = CountingProjection::default();
        let second = CountingProjection::default();
        let mut processor = ProjectionProcessor::new(store_with(2).await).with(first.clone());
        processor.run_catch_up().await.unwrap();

        processor.register(Box::new(second.clone()));
        assert_eq!(processor.run_catch_up().await.unwrap(), 2);
        assert_eq!(first.handled(), 2);
        assert_eq!(second.handled(), 2);
    }

    #[tokio::test]
    async fn concurrent_catch_ups_do_not_double_deliver() {
        let projection = CountingProjection::default();
        let processor =
            Arc::new(ProjectionProcessor::new(store_with(5).await).with(projection.clone()));

        let a = tokio::spawn({
            let processor = processor.clone();
            async move { processor.run_catch_up().await.unwrap() }
        });
        let b = tokio::spawn({
            let processor = processor.clone();
            async move { processor.run_catch_up().await.unwrap() }
        });

        assert_eq!(a.await.unwrap() + b.await.unwrap(), 5);
        assert_eq!(projection.handled(), 5);
    }

    #[tokio::test]
    async fn rebuild_replays_from_scratch() {
        let projection = CountingProjection::default();
        let processor = ProjectionProcessor::new(store_with(2).await).with(projection.clone());

        processor.run_catch_up().await.unwrap();
        assert_eq!(processor.rebuild_all().await.unwrap(), 2);
        assert_eq!(projection.handled(), 2);
    }

    #[tokio::test]
    async fn empty_store_delivers_nothing() {
        let processor =
            ProjectionProcessor::new(store_with(0).await).with(CountingProjection::default());
        assert_eq!(processor.run_catch_up().await.unwrap(), 0);
    }
}
