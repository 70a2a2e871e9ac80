//! Event store for the clinic core.
//!
//! Every aggregate lives in its own stream of events. Writes carry the
//! version the writer last observed; a stale writer gets
//! [`EventStoreError::ConcurrencyConflict`]. Writes that touch several
//! aggregates go through [`EventStore::commit`], which checks and appends
//! all streams atomically.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::{COMMIT_LOCK_KEY, PostgresEventStore};
pub use query::EventQuery;
pub use store::{
    AppendOptions, EventStore, EventStoreExt, EventStream, LoggedEvent, LoggedEventStream,
    StreamAppend,
};
