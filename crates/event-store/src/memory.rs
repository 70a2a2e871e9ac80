use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    AggregateId, EventEnvelope, EventQuery, EventStoreError, Result, Version,
    store::{EventStore, LoggedEvent, LoggedEventStream, StreamAppend, validate_commit},
};

#[derive(Default)]
struct Log {
    events: Vec<EventEnvelope>,
    heads: HashMap<AggregateId, Version>,
}

impl Log {
    fn head(&self, aggregate_id: AggregateId) -> Version {
        self.heads
            .get(&aggregate_id)
            .copied()
            .unwrap_or(Version::initial())
    }
}

/// In-memory event store.
///
/// Provides the same interface and commit semantics as the PostgreSQL
/// implementation; a single lock guards the log so multi-stream commits
/// are atomic.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    log: Arc<RwLock<Log>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.log.read().await.events.len()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn commit(&self, appends: Vec<StreamAppend>) -> Result<Vec<Version>> {
        validate_commit(&appends)?;

        let mut log = self.log.write().await;

        // Nothing is written until every stream passes its check.
        for append in &appends {
            let first = &append.events[0];
            let current = log.head(first.aggregate_id);

            if let Some(expected) = append.options.expected_version
                && current != expected
            {
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id: first.aggregate_id,
                    expected,
                    actual: current,
                });
            }

            // Mirrors the unique (aggregate_id, version) constraint.
            if first.version != current.next() {
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id: first.aggregate_id,
                    expected: append.options.expected_version.unwrap_or(current),
                    actual: current,
                });
            }
        }

        let commit_id = Uuid::new_v4().to_string();
        let stamp = appends.len() > 1;
        let mut versions = Vec::with_capacity(appends.len());

        for append in appends {
            let mut last = Version::initial();
            for mut event in append.events {
                if stamp {
                    event.stamp_commit(&commit_id);
                }
                last = event.version;
                log.heads.insert(event.aggregate_id, last);
                log.events.push(event);
            }
            versions.push(last);
        }

        Ok(versions)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        Ok(log
            .events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect())
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        let matching = log.events.iter().filter(|e| query.matches(e)).cloned();

        Ok(match query.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    async fn stream_events_after(&self, position: u64) -> Result<LoggedEventStream> {
        use futures_util::stream;

        let log = self.log.read().await;
        let start = usize::try_from(position)
            .unwrap_or(usize::MAX)
            .min(log.events.len());
        let tail: Vec<Result<LoggedEvent>> = log.events[start..]
            .iter()
            .zip(start as u64 + 1..)
            .map(|(event, position)| {
                Ok(LoggedEvent {
                    position,
                    event: event.clone(),
                })
            })
            .collect();
        Ok(Box::pin(stream::iter(tail)))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        Ok(self.log.read().await.heads.get(&aggregate_id).copied())
    }
}
