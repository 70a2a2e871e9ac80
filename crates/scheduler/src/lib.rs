//! Deferred one-shot tasks keyed by aggregate.
//!
//! A key holds at most one armed task. Arming a key again supersedes the
//! pending task, which then never runs. Cancelling disarms the key.

mod deferred;

pub use deferred::DeferredTasks;
