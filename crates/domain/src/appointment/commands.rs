//! Appointment commands.

use chrono::{DateTime, Utc};
use common::AggregateId;

use crate::value_objects::{DoctorId, PatientId};

use super::Role;

/// Command to book a new appointment.
#[derive(Debug, Clone)]
pub struct BookAppointment {
    pub appointment_id: AggregateId,
    pub patient_id: PatientId,
    pub doctor_id: DoctorId,
    pub scheduled_at: DateTime<Utc>,

    /// Who is booking; the other party has to confirm.
    pub initiator: Role,
}

impl BookAppointment {
    /// Creates a booking with a generated appointment ID.
    pub fn new(
        patient_id: impl Into<PatientId>,
        doctor_id: impl Into<DoctorId>,
        scheduled_at: DateTime<Utc>,
        initiator: Role,
    ) -> Self {
        Self {
            appointment_id: AggregateId::new(),
            patient_id: patient_id.into(),
            doctor_id: doctor_id.into(),
            scheduled_at,
            initiator,
        }
    }
}

/// Command to move an appointment to a new time.
#[derive(Debug, Clone)]
pub struct RescheduleAppointment {
    pub appointment_id: AggregateId,
    pub scheduled_at: DateTime<Utc>,
    pub initiator: Role,
}

impl RescheduleAppointment {
    pub fn new(appointment_id: AggregateId, scheduled_at: DateTime<Utc>, initiator: Role) -> Self {
        Self {
            appointment_id,
            scheduled_at,
            initiator,
        }
    }
}

/// Command to confirm an appointment as `role`.
#[derive(Debug, Clone)]
pub struct ConfirmAppointment {
    pub appointment_id: AggregateId,
    pub role: Role,
}

impl ConfirmAppointment {
    pub fn new(appointment_id: AggregateId, role: Role) -> Self {
        Self {
            appointment_id,
            role,
        }
    }
}

/// Command to cancel an appointment and arm its deferred deletion.
#[derive(Debug, Clone)]
pub struct CancelAppointment {
    pub appointment_id: AggregateId,
}

impl CancelAppointment {
    pub fn new(appointment_id: AggregateId) -> Self {
        Self { appointment_id }
    }
}

/// Command to replace an appointment's free-text note.
#[derive(Debug, Clone)]
pub struct UpdateNote {
    pub appointment_id: AggregateId,
    pub note: String,
}

impl UpdateNote {
    pub fn new(appointment_id: AggregateId, note: impl Into<String>) -> Self {
        Self {
            appointment_id,
            note: note.into(),
        }
    }
}
