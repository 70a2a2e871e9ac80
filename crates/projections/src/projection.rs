//! Projection trait and log positions.

use async_trait::async_trait;
use event_store::EventEnvelope;

use crate::Result;

/// How far into the global event log a projection has read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProjectionPosition {
    /// Log position of the last event delivered; zero before the first.
    pub last_position: u64,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn at(position: u64) -> Self {
        Self {
            last_position: position,
        }
    }

    pub fn has_seen(&self, position: u64) -> bool {
        position <= self.last_position
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({})", self.last_position)
    }
}

/// A projection folds the event log into a read model.
///
/// Every event in the log is handed to every projection in log order.
/// Projections ignore events for aggregates they do not track.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &EventEnvelope) -> Result<()>;

    /// Drops all state so the log can be replayed from the start.
    async fn reset(&self) -> Result<()>;
}
