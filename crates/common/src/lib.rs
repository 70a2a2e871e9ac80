//! Shared types for the clinic core.

pub mod clock;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use types::AggregateId;
