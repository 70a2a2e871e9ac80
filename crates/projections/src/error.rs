//! Projection error types.

use domain::ErrorKind;
use thiserror::Error;

/// Errors that can occur while projecting or querying read models.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// A stored payload no longer matches its event type.
    #[error("Event deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

impl ProjectionError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
