use std::collections::HashSet;
use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use futures_util::StreamExt;

use crate::{AggregateId, EventEnvelope, EventQuery, EventStoreError, Result, Version};

/// Options for appending events to the store.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Expected version of the aggregate for optimistic concurrency control.
    /// If None, no version check is performed (use with caution).
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    /// Creates options with no version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the aggregate to be at a specific version.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Creates options expecting the aggregate to not exist (new aggregate).
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }
}

/// Events for one stream inside a multi-stream commit.
#[derive(Debug, Clone)]
pub struct StreamAppend {
    pub events: Vec<EventEnvelope>,
    pub options: AppendOptions,
}

impl StreamAppend {
    pub fn new(events: Vec<EventEnvelope>, options: AppendOptions) -> Self {
        Self { events, options }
    }

    /// The stream this append targets. Validation guarantees `events` is non-empty.
    pub fn aggregate_id(&self) -> Option<AggregateId> {
        self.events.first().map(|e| e.aggregate_id)
    }
}

/// A stream of events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

/// An event together with its position in the global log.
///
/// Positions start at 1 and grow in commit order, so a reader that has seen
/// position `n` never later finds an event at or below `n`.
#[derive(Debug, Clone)]
pub struct LoggedEvent {
    pub position: u64,
    pub event: EventEnvelope,
}

/// A stream of positioned events.
pub type LoggedEventStream = Pin<Box<dyn Stream<Item = Result<LoggedEvent>> + Send>>;

/// Core trait for event store implementations.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends events to a single stream.
    ///
    /// Events are appended atomically. If `options.expected_version` is set,
    /// the operation fails with `ConcurrencyConflict` when the current
    /// version doesn't match.
    ///
    /// Returns the new version of the aggregate after appending.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        let mut versions = self.commit(vec![StreamAppend::new(events, options)]).await?;
        versions
            .pop()
            .ok_or_else(|| EventStoreError::InvalidAppend("commit returned no version".into()))
    }

    /// Appends to several streams as one unit.
    ///
    /// Every expected version is checked before anything is written; a
    /// single mismatch rejects the whole commit. Returns the new version of
    /// each stream, in the order given.
    async fn commit(&self, appends: Vec<StreamAppend>) -> Result<Vec<Version>>;

    /// Retrieves all events for a specific aggregate, oldest first.
    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    /// Retrieves events matching a query, in global insertion order.
    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>>;

    /// Streams all events in the store in insertion order.
    async fn stream_all_events(&self) -> Result<EventStream> {
        let logged = self.stream_events_after(0).await?;
        Ok(Box::pin(logged.map(|result| result.map(|logged| logged.event))))
    }

    /// Streams the events whose log position is greater than `position`.
    async fn stream_events_after(&self, position: u64) -> Result<LoggedEventStream>;

    /// Gets the current version of an aggregate.
    ///
    /// Returns None if the aggregate doesn't exist.
    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;
}

/// Extension trait providing convenience methods for event stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Appends a single event to the store.
    async fn append_event(&self, event: EventEnvelope, options: AppendOptions) -> Result<Version> {
        self.append(vec![event], options).await
    }

    /// Checks if an aggregate exists (has any events).
    async fn aggregate_exists(&self, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.get_aggregate_version(aggregate_id).await?.is_some())
    }
}

impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Validates the events of one stream before appending.
pub fn validate_events_for_append(events: &[EventEnvelope]) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::InvalidAppend(
            "cannot append empty event list".to_string(),
        ));
    };

    for event in events.iter().skip(1) {
        if event.aggregate_id != first.aggregate_id {
            return Err(EventStoreError::InvalidAppend(
                "all events must be for the same aggregate".to_string(),
            ));
        }
        if event.aggregate_type != first.aggregate_type {
            return Err(EventStoreError::InvalidAppend(
                "all events must have the same aggregate type".to_string(),
            ));
        }
    }

    let mut expected_version = first.version;
    for event in events.iter().skip(1) {
        expected_version = expected_version.next();
        if event.version != expected_version {
            return Err(EventStoreError::InvalidAppend(format!(
                "event versions must be sequential, expected {}, got {}",
                expected_version, event.version
            )));
        }
    }

    Ok(())
}

/// Validates a multi-stream commit: each stream valid and named once.
pub fn validate_commit(appends: &[StreamAppend]) -> Result<()> {
    if appends.is_empty() {
        return Err(EventStoreError::InvalidAppend(
            "cannot commit without streams".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for append in appends {
        validate_events_for_append(&append.events)?;
        let id = append.events[0].aggregate_id;
        if !seen.insert(id) {
            return Err(EventStoreError::InvalidAppend(format!(
                "stream {id} appears twice in one commit"
            )));
        }
    }
    Ok(())
}
