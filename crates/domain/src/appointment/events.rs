//! Appointment domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::{DoctorId, PatientId};

use super::{AppointmentStatus, Role};

/// Events that can occur on an appointment aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AppointmentEvent {
    AppointmentBooked(AppointmentBookedData),
    AppointmentRescheduled(AppointmentRescheduledData),
    AppointmentConfirmed(AppointmentConfirmedData),
    AppointmentCancelled(AppointmentCancelledData),
    AppointmentNoteUpdated(AppointmentNoteUpdatedData),

    /// Tombstone written when a cancelled appointment is purged.
    AppointmentDeleted(AppointmentDeletedData),
}

impl DomainEvent for AppointmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AppointmentEvent::AppointmentBooked(_) => "AppointmentBooked",
            AppointmentEvent::AppointmentRescheduled(_) => "AppointmentRescheduled",
            AppointmentEvent::AppointmentConfirmed(_) => "AppointmentConfirmed",
            AppointmentEvent::AppointmentCancelled(_) => "AppointmentCancelled",
            AppointmentEvent::AppointmentNoteUpdated(_) => "AppointmentNoteUpdated",
            AppointmentEvent::AppointmentDeleted(_) => "AppointmentDeleted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentBookedData {
    pub appointment_id: AggregateId,
    pub patient_id: PatientId,
    pub doctor_id: DoctorId,
    pub scheduled_at: DateTime<Utc>,
    pub booked_by: Role,

    /// Status the appointment starts in.
    pub status: AppointmentStatus,
    pub booked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentRescheduledData {
    pub previous_scheduled_at: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
    pub rescheduled_by: Role,
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentConfirmedData {
    pub confirmed_by: Role,
    pub confirmed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentCancelledData {
    pub previous_status: AppointmentStatus,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentNoteUpdatedData {
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentDeletedData {
    /// Status at the moment of deletion; not `Cancelled` only under an
    /// unconditional purge policy.
    pub status: AppointmentStatus,
    pub deleted_at: DateTime<Utc>,
}

// Factory methods
impl AppointmentEvent {
    pub fn booked(
        appointment_id: AggregateId,
        patient_id: PatientId,
        doctor_id: DoctorId,
        scheduled_at: DateTime<Utc>,
        booked_by: Role,
        booked_at: DateTime<Utc>,
    ) -> Self {
        AppointmentEvent::AppointmentBooked(AppointmentBookedData {
            appointment_id,
            patient_id,
            doctor_id,
            scheduled_at,
            booked_by,
            status: AppointmentStatus::proposed_by(booked_by),
            booked_at,
        })
    }

    pub fn rescheduled(
        previous_scheduled_at: DateTime<Utc>,
        scheduled_at: DateTime<Utc>,
        rescheduled_by: Role,
    ) -> Self {
        AppointmentEvent::AppointmentRescheduled(AppointmentRescheduledData {
            previous_scheduled_at,
            scheduled_at,
            rescheduled_by,
            status: AppointmentStatus::proposed_by(rescheduled_by),
        })
    }

    pub fn confirmed(confirmed_by: Role, confirmed_at: DateTime<Utc>) -> Self {
        AppointmentEvent::AppointmentConfirmed(AppointmentConfirmedData {
            confirmed_by,
            confirmed_at,
        })
    }

    pub fn cancelled(previous_status: AppointmentStatus, cancelled_at: DateTime<Utc>) -> Self {
        AppointmentEvent::AppointmentCancelled(AppointmentCancelledData {
            previous_status,
            cancelled_at,
        })
    }

    pub fn note_updated(note: impl Into<String>) -> Self {
        AppointmentEvent::AppointmentNoteUpdated(AppointmentNoteUpdatedData { note: note.into() })
    }

    pub fn deleted(status: AppointmentStatus, deleted_at: DateTime<Utc>) -> Self {
        AppointmentEvent::AppointmentDeleted(AppointmentDeletedData { status, deleted_at })
    }
}
