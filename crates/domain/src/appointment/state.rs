//! Appointment state machine.

use serde::{Deserialize, Serialize};

/// Party acting on an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Doctor,
}

impl Role {
    /// The state in which this role's confirmation is the pending step.
    pub fn awaiting_state(&self) -> AppointmentStatus {
        match self {
            Role::Patient => AppointmentStatus::AwaitingPatientConfirmation,
            Role::Doctor => AppointmentStatus::AwaitingDoctorConfirmation,
        }
    }

    /// The other party.
    pub fn counterpart(&self) -> Role {
        match self {
            Role::Patient => Role::Doctor,
            Role::Doctor => Role::Patient,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The state of an appointment in its lifecycle.
///
/// State transitions:
/// ```text
///                  reschedule (by X) ──► Awaiting<counterpart of X>
///
/// AwaitingDoctorConfirmation ──confirm(Doctor)──►  Confirmed
/// AwaitingPatientConfirmation ──confirm(Patient)──► Confirmed
///
/// any state except Cancelled ──cancel──► Cancelled ──(cooldown)──► deleted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[default]
    AwaitingDoctorConfirmation,
    AwaitingPatientConfirmation,
    Confirmed,
    Cancelled,
}

impl AppointmentStatus {
    /// Status after `initiator` books or reschedules: the other party must confirm.
    pub fn proposed_by(initiator: Role) -> Self {
        initiator.counterpart().awaiting_state()
    }

    /// Returns true if `role` may confirm from this state.
    pub fn can_confirm(&self, role: Role) -> bool {
        *self == role.awaiting_state()
    }

    pub fn can_reschedule(&self) -> bool {
        !self.is_cancelled()
    }

    pub fn can_cancel(&self) -> bool {
        !self.is_cancelled()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppointmentStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::AwaitingDoctorConfirmation => "awaiting_doctor_confirmation",
            AppointmentStatus::AwaitingPatientConfirmation => "awaiting_patient_confirmation",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
