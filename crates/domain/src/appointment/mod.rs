//! Appointment aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;

pub use aggregate::Appointment;
pub use commands::*;
pub use events::{
    AppointmentBookedData, AppointmentCancelledData, AppointmentConfirmedData,
    AppointmentDeletedData, AppointmentEvent, AppointmentNoteUpdatedData,
    AppointmentRescheduledData,
};
pub use service::{AppointmentService, PurgeSettings};
pub use state::{AppointmentStatus, Role};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ErrorKind;

/// What the deferred deletion does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PurgePolicy {
    /// Delete only if the appointment is still cancelled.
    #[default]
    RequireCancelled,

    /// Delete whatever the current status.
    Unconditional,
}

impl std::str::FromStr for PurgePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "require-cancelled" => Ok(PurgePolicy::RequireCancelled),
            "unconditional" => Ok(PurgePolicy::Unconditional),
            other => Err(format!("unknown purge policy: {other}")),
        }
    }
}

/// Errors that can occur during appointment operations.
#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error("Appointment already booked")]
    AlreadyBooked,

    /// Confirmation attempted by a role whose confirmation is not pending.
    #[error("Invalid transition: {role} cannot confirm, expected {expected} but appointment is {actual}")]
    InvalidTransition {
        role: Role,
        expected: AppointmentStatus,
        actual: AppointmentStatus,
    },

    #[error("Invalid transition: cannot {action} a cancelled appointment")]
    AlreadyCancelled { action: &'static str },

    /// Purge refused because the appointment left the cancelled state.
    #[error("Appointment is {actual}, not cancelled")]
    NotCancelled { actual: AppointmentStatus },
}

impl AppointmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppointmentError::AlreadyBooked => ErrorKind::InvalidOperation,
            AppointmentError::InvalidTransition { .. }
            | AppointmentError::AlreadyCancelled { .. }
            | AppointmentError::NotCancelled { .. } => ErrorKind::InvalidTransition,
        }
    }
}
