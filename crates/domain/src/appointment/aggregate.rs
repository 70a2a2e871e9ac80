//! Appointment aggregate implementation.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use serde::Serialize;

use crate::aggregate::Aggregate;
use crate::value_objects::{DoctorId, PatientId};

use super::{
    AppointmentError, AppointmentEvent, AppointmentStatus, PurgePolicy, Role,
    events::AppointmentBookedData,
};

/// Appointment aggregate root.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Appointment {
    id: Option<AggregateId>,

    #[serde(skip)]
    version: Version,

    patient_id: PatientId,
    doctor_id: DoctorId,
    scheduled_at: DateTime<Utc>,
    status: AppointmentStatus,
    note: String,
    booked_by: Option<Role>,
    cancelled_at: Option<DateTime<Utc>>,

    #[serde(skip)]
    deleted: bool,
}

impl Aggregate for Appointment {
    type Event = AppointmentEvent;
    type Error = AppointmentError;

    fn aggregate_type() -> &'static str {
        "Appointment"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            AppointmentEvent::AppointmentBooked(data) => self.apply_booked(data),
            AppointmentEvent::AppointmentRescheduled(data) => {
                self.scheduled_at = data.scheduled_at;
                self.status = data.status;
            }
            AppointmentEvent::AppointmentConfirmed(_) => {
                self.status = AppointmentStatus::Confirmed;
            }
            AppointmentEvent::AppointmentCancelled(data) => {
                self.status = AppointmentStatus::Cancelled;
                self.cancelled_at = Some(data.cancelled_at);
            }
            AppointmentEvent::AppointmentNoteUpdated(data) => {
                self.note = data.note;
            }
            AppointmentEvent::AppointmentDeleted(_) => {
                self.deleted = true;
            }
        }
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }
}

// Query methods
impl Appointment {
    pub fn patient_id(&self) -> PatientId {
        self.patient_id
    }

    pub fn doctor_id(&self) -> DoctorId {
        self.doctor_id
    }

    pub fn scheduled_at(&self) -> DateTime<Utc> {
        self.scheduled_at
    }

    pub fn status(&self) -> AppointmentStatus {
        self.status
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    /// Who made the original booking.
    pub fn booked_by(&self) -> Option<Role> {
        self.booked_by
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }
}

// Command methods (return events)
impl Appointment {
    pub fn book(
        &self,
        appointment_id: AggregateId,
        patient_id: PatientId,
        doctor_id: DoctorId,
        scheduled_at: DateTime<Utc>,
        initiator: Role,
        now: DateTime<Utc>,
    ) -> Result<Vec<AppointmentEvent>, AppointmentError> {
        if self.id.is_some() {
            return Err(AppointmentError::AlreadyBooked);
        }

        Ok(vec![AppointmentEvent::booked(
            appointment_id,
            patient_id,
            doctor_id,
            scheduled_at,
            initiator,
            now,
        )])
    }

    /// Moves the appointment and hands confirmation to the other party.
    pub fn reschedule(
        &self,
        scheduled_at: DateTime<Utc>,
        initiator: Role,
    ) -> Result<Vec<AppointmentEvent>, AppointmentError> {
        if !self.status.can_reschedule() {
            return Err(AppointmentError::AlreadyCancelled {
                action: "reschedule",
            });
        }

        Ok(vec![AppointmentEvent::rescheduled(
            self.scheduled_at,
            scheduled_at,
            initiator,
        )])
    }

    pub fn confirm(
        &self,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<Vec<AppointmentEvent>, AppointmentError> {
        if !self.status.can_confirm(role) {
            return Err(AppointmentError::InvalidTransition {
                role,
                expected: role.awaiting_state(),
                actual: self.status,
            });
        }

        Ok(vec![AppointmentEvent::confirmed(role, now)])
    }

    pub fn cancel(&self, now: DateTime<Utc>) -> Result<Vec<AppointmentEvent>, AppointmentError> {
        if !self.status.can_cancel() {
            return Err(AppointmentError::AlreadyCancelled { action: "cancel" });
        }

        Ok(vec![AppointmentEvent::cancelled(self.status, now)])
    }

    /// Replaces the note. Valid in any state; an identical note is a no-op.
    pub fn update_note(&self, note: String) -> Result<Vec<AppointmentEvent>, AppointmentError> {
        if note == self.note {
            return Ok(vec![]);
        }
        Ok(vec![AppointmentEvent::note_updated(note)])
    }

    /// Tombstones the appointment once its cooldown has elapsed.
    pub fn purge(
        &self,
        policy: PurgePolicy,
        now: DateTime<Utc>,
    ) -> Result<Vec<AppointmentEvent>, AppointmentError> {
        if policy == PurgePolicy::RequireCancelled && !self.status.is_cancelled() {
            return Err(AppointmentError::NotCancelled {
                actual: self.status,
            });
        }

        Ok(vec![AppointmentEvent::deleted(self.status, now)])
    }
}

impl Appointment {
    fn apply_booked(&mut self, data: AppointmentBookedData) {
        self.id = Some(data.appointment_id);
        self.patient_id = data.patient_id;
        self.doctor_id = data.doctor_id;
        self.scheduled_at = data.scheduled_at;
        self.status = data.status;
        self.booked_by = Some(data.booked_by);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn when() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 6, 12, 0, 0).unwrap()
    }

    fn booked_by(initiator: Role) -> Appointment {
        let mut appointment = Appointment::default();
        let events = appointment
            .book(
                AggregateId::new(),
                PatientId::new(16),
                DoctorId::new(3),
                when(),
                initiator,
                Utc::now(),
            )
            .unwrap();
        appointment.apply_events(events);
        appointment
    }

    fn run(
        appointment: &mut Appointment,
        result: Result<Vec<AppointmentEvent>, AppointmentError>,
    ) {
        appointment.apply_events(result.unwrap());
    }

    #[test]
    fn patient_booking_awaits_doctor() {
        let appointment = booked_by(Role::Patient);

        assert_eq!(
            appointment.status(),
            AppointmentStatus::AwaitingDoctorConfirmation
        );
        assert_eq!(appointment.patient_id(), PatientId::new(16));
        assert_eq!(appointment.doctor_id(), DoctorId::new(3));
        assert_eq!(appointment.scheduled_at(), when());
        assert_eq!(appointment.note(), "");
        assert_eq!(appointment.booked_by(), Some(Role::Patient));
    }

    #[test]
    fn cannot_book_twice() {
        let appointment = booked_by(Role::Patient);
        let result = appointment.book(
            AggregateId::new(),
            PatientId::new(1),
            DoctorId::new(1),
            when(),
            Role::Patient,
            Utc::now(),
        );
        assert!(matches!(result, Err(AppointmentError::AlreadyBooked)));
    }

    #[test]
    fn confirm_then_confirm_again_fails() {
        let mut appointment = booked_by(Role::Patient);

        let wrong_role = appointment.confirm(Role::Patient, Utc::now());
        assert!(matches!(
            wrong_role,
            Err(AppointmentError::InvalidTransition {
                expected: AppointmentStatus::AwaitingPatientConfirmation,
                actual: AppointmentStatus::AwaitingDoctorConfirmation,
                ..
            })
        ));

        let result = appointment.confirm(Role::Doctor, Utc::now());
        run(&mut appointment, result);
        assert_eq!(appointment.status(), AppointmentStatus::Confirmed);

        let again = appointment.confirm(Role::Doctor, Utc::now());
        assert!(matches!(
            again,
            Err(AppointmentError::InvalidTransition {
                actual: AppointmentStatus::Confirmed,
                ..
            })
        ));
    }

    #[test]
    fn reschedule_hands_confirmation_to_counterpart() {
        let mut appointment = booked_by(Role::Patient);
        let result = appointment.confirm(Role::Doctor, Utc::now());
        run(&mut appointment, result);

        let later = when() + chrono::Duration::days(1);
        let result = appointment.reschedule(later, Role::Doctor);
        run(&mut appointment, result);

        assert_eq!(appointment.scheduled_at(), later);
        assert_eq!(
            appointment.status(),
            AppointmentStatus::AwaitingPatientConfirmation
        );

        let result = appointment.reschedule(when(), Role::Patient);
        run(&mut appointment, result);
        assert_eq!(
            appointment.status(),
            AppointmentStatus::AwaitingDoctorConfirmation
        );
    }

    #[test]
    fn cancelled_appointment_rejects_reschedule_confirm_and_cancel() {
        let mut appointment = booked_by(Role::Doctor);
        let now = Utc::now();
        let result = appointment.cancel(now);
        run(&mut appointment, result);

        assert_eq!(appointment.status(), AppointmentStatus::Cancelled);
        assert_eq!(appointment.cancelled_at(), Some(now));

        assert!(matches!(
            appointment.reschedule(when(), Role::Patient),
            Err(AppointmentError::AlreadyCancelled { .. })
        ));
        assert!(matches!(
            appointment.cancel(now),
            Err(AppointmentError::AlreadyCancelled { .. })
        ));
        assert!(matches!(
            appointment.confirm(Role::Patient, now),
            Err(AppointmentError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn note_updates_in_any_state_without_touching_status() {
        let mut appointment = booked_by(Role::Patient);
        let result = appointment.cancel(Utc::now());
        run(&mut appointment, result);

        let result = appointment.update_note("fasting required".to_string());
        run(&mut appointment, result);

        assert_eq!(appointment.note(), "fasting required");
        assert_eq!(appointment.status(), AppointmentStatus::Cancelled);
        assert!(
            appointment
                .update_note("fasting required".to_string())
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn purge_respects_policy() {
        let mut appointment = booked_by(Role::Patient);

        assert!(matches!(
            appointment.purge(PurgePolicy::RequireCancelled, Utc::now()),
            Err(AppointmentError::NotCancelled { .. })
        ));
        assert_eq!(
            appointment
                .purge(PurgePolicy::Unconditional, Utc::now())
                .unwrap()
                .len(),
            1
        );

        let result = appointment.cancel(Utc::now());
        run(&mut appointment, result);
        let result = appointment.purge(PurgePolicy::RequireCancelled, Utc::now());
        run(&mut appointment, result);
        assert!(appointment.is_deleted());
    }
}
