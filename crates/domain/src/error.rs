//! Domain error types.

use event_store::EventStoreError;
use serde::Serialize;
use thiserror::Error;

use crate::appointment::AppointmentError;
use crate::billing::BillingError;
use crate::cart::CartError;

/// Coarse classification shared by every error in the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidTransition,
    InvalidOperation,
    AlreadySettled,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::InvalidOperation => "invalid_operation",
            ErrorKind::AlreadySettled => "already_settled",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Appointment error: {0}")]
    Appointment(#[from] AppointmentError),

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    #[error("Billing error: {0}")]
    Billing(#[from] BillingError),

    /// An aggregate, directory entry or catalog entry does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::EventStore(e) if e.is_conflict() => ErrorKind::Conflict,
            DomainError::EventStore(_) | DomainError::Serialization(_) => ErrorKind::Internal,
            DomainError::Appointment(e) => e.kind(),
            DomainError::Cart(e) => e.kind(),
            DomainError::Billing(e) => e.kind(),
            DomainError::NotFound { .. } => ErrorKind::NotFound,
        }
    }

    /// Returns true if a concurrent writer got there first.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DomainError::EventStore(e) if e.is_conflict())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::AggregateId;
    use event_store::Version;

    #[test]
    fn conflict_is_classified_separately_from_other_store_errors() {
        let conflict = DomainError::from(EventStoreError::ConcurrencyConflict {
            aggregate_id: AggregateId::new(),
            expected: Version::first(),
            actual: Version::new(2),
        });
        assert_eq!(conflict.kind(), ErrorKind::Conflict);
        assert!(conflict.is_conflict());

        let invalid = DomainError::from(EventStoreError::InvalidAppend("empty".into()));
        assert_eq!(invalid.kind(), ErrorKind::Internal);
    }

    #[test]
    fn not_found_message() {
        let err = DomainError::not_found("Medication", 42);
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Medication not found: 42");
    }
}
