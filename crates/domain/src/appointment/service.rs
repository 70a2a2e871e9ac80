//! Appointment service: booking, the confirmation handshake, cancellation
//! and the deferred purge of cancelled appointments.

use std::sync::Arc;
use std::time::Duration;

use common::{AggregateId, Clock};
use event_store::EventStore;
use scheduler::DeferredTasks;

use crate::aggregate::Aggregate;
use crate::command::{CommandHandler, CommandResult};
use crate::directory::ClinicDirectory;
use crate::error::DomainError;

use super::{
    Appointment, AppointmentError, BookAppointment, CancelAppointment, ConfirmAppointment,
    PurgePolicy, RescheduleAppointment, UpdateNote,
};

/// How long a cancelled appointment lingers and what happens when it expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeSettings {
    pub cooldown: Duration,
    pub policy: PurgePolicy,
}

impl Default for PurgeSettings {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(24 * 60 * 60),
            policy: PurgePolicy::RequireCancelled,
        }
    }
}

/// Service for managing appointments.
pub struct AppointmentService<S: EventStore + Clone + 'static> {
    handler: CommandHandler<S, Appointment>,
    directory: Arc<dyn ClinicDirectory>,
    clock: Arc<dyn Clock>,
    deferred: DeferredTasks,
    purge: PurgeSettings,
}

impl<S: EventStore + Clone + 'static> AppointmentService<S> {
    pub fn new(
        store: S,
        directory: Arc<dyn ClinicDirectory>,
        clock: Arc<dyn Clock>,
        deferred: DeferredTasks,
    ) -> Self {
        Self {
            handler: CommandHandler::new(store),
            directory,
            clock,
            deferred,
            purge: PurgeSettings::default(),
        }
    }

    pub fn with_purge_settings(mut self, purge: PurgeSettings) -> Self {
        self.purge = purge;
        self
    }

    pub fn purge_settings(&self) -> PurgeSettings {
        self.purge
    }

    /// Returns true while a deferred purge is pending for the appointment.
    pub fn is_purge_armed(&self, appointment_id: AggregateId) -> bool {
        self.deferred.is_armed(appointment_id)
    }

    /// Books an appointment after checking both parties exist.
    #[tracing::instrument(skip(self))]
    pub async fn book(
        &self,
        cmd: BookAppointment,
    ) -> Result<CommandResult<Appointment>, DomainError> {
        if !self.directory.has_patient(cmd.patient_id).await {
            return Err(DomainError::not_found("Patient", cmd.patient_id));
        }
        if !self.directory.has_doctor(cmd.doctor_id).await {
            return Err(DomainError::not_found("Doctor", cmd.doctor_id));
        }

        let now = self.clock.now();
        let result = self
            .handler
            .execute(cmd.appointment_id, |appointment| {
                appointment.book(
                    cmd.appointment_id,
                    cmd.patient_id,
                    cmd.doctor_id,
                    cmd.scheduled_at,
                    cmd.initiator,
                    now,
                )
            })
            .await?;

        metrics::counter!("appointments_booked_total").increment(1);
        tracing::info!(
            appointment_id = %cmd.appointment_id,
            status = %result.aggregate.status(),
            "appointment booked"
        );
        Ok(result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn reschedule(
        &self,
        cmd: RescheduleAppointment,
    ) -> Result<CommandResult<Appointment>, DomainError> {
        let result = self
            .handler
            .execute_existing(cmd.appointment_id, |appointment| {
                appointment.reschedule(cmd.scheduled_at, cmd.initiator)
            })
            .await?;

        tracing::info!(
            appointment_id = %cmd.appointment_id,
            status = %result.aggregate.status(),
            "appointment rescheduled"
        );
        self.disarm_if_reopened(&result);
        Ok(result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn confirm(
        &self,
        cmd: ConfirmAppointment,
    ) -> Result<CommandResult<Appointment>, DomainError> {
        let now = self.clock.now();
        let result = self
            .handler
            .execute_existing(cmd.appointment_id, |appointment| {
                appointment.confirm(cmd.role, now)
            })
            .await?;

        tracing::info!(appointment_id = %cmd.appointment_id, role = %cmd.role, "appointment confirmed");
        self.disarm_if_reopened(&result);
        Ok(result)
    }

    /// Cancels the appointment and arms its purge after the cooldown.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(
        &self,
        cmd: CancelAppointment,
    ) -> Result<CommandResult<Appointment>, DomainError> {
        let now = self.clock.now();
        let result = self
            .handler
            .execute_existing(cmd.appointment_id, |appointment| appointment.cancel(now))
            .await?;

        metrics::counter!("appointments_cancelled_total").increment(1);
        tracing::info!(appointment_id = %cmd.appointment_id, "appointment cancelled");
        self.arm_purge(cmd.appointment_id);
        Ok(result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_note(
        &self,
        cmd: UpdateNote,
    ) -> Result<CommandResult<Appointment>, DomainError> {
        self.handler
            .execute_existing(cmd.appointment_id, |appointment| {
                appointment.update_note(cmd.note)
            })
            .await
    }

    /// Loads an appointment; `NotFound` if it never existed or was purged.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, appointment_id: AggregateId) -> Result<Appointment, DomainError> {
        self.handler.get(appointment_id).await
    }

    /// Runs the purge check immediately, as the deferred task would.
    pub async fn purge(&self, appointment_id: AggregateId) -> Result<(), DomainError> {
        purge_appointment(&self.handler, self.clock.as_ref(), self.purge.policy, appointment_id)
            .await
    }

    fn arm_purge(&self, appointment_id: AggregateId) {
        let handler = self.handler.clone();
        let clock = self.clock.clone();
        let policy = self.purge.policy;

        self.deferred
            .schedule(appointment_id, self.purge.cooldown, async move {
                if let Err(e) =
                    purge_appointment(&handler, clock.as_ref(), policy, appointment_id).await
                {
                    tracing::error!(%appointment_id, error = %e, "appointment purge failed");
                }
            });
    }

    // The state machine has no way out of Cancelled today; this keeps a stale
    // timer from firing if that ever changes.
    fn disarm_if_reopened(&self, result: &CommandResult<Appointment>) {
        if let Some(id) = result.aggregate.id()
            && !result.aggregate.status().is_cancelled()
            && self.deferred.cancel(id)
        {
            tracing::info!(appointment_id = %id, "pending purge disarmed");
        }
    }
}

async fn purge_appointment<S: EventStore>(
    handler: &CommandHandler<S, Appointment>,
    clock: &dyn Clock,
    policy: PurgePolicy,
    appointment_id: AggregateId,
) -> Result<(), DomainError> {
    let now = clock.now();
    match handler
        .execute_existing(appointment_id, |appointment| appointment.purge(policy, now))
        .await
    {
        Ok(result) => {
            metrics::counter!("appointments_purged_total").increment(1);
            tracing::info!(
                %appointment_id,
                status = %result.aggregate.status(),
                "appointment purged"
            );
            Ok(())
        }
        Err(DomainError::NotFound { .. }) => {
            tracing::debug!(%appointment_id, "appointment already gone, nothing to purge");
            Ok(())
        }
        Err(DomainError::Appointment(AppointmentError::NotCancelled { actual })) => {
            tracing::warn!(%appointment_id, status = %actual, "purge skipped, appointment no longer cancelled");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appointment::{AppointmentStatus, Role};
    use crate::directory::InMemoryDirectory;
    use crate::error::ErrorKind;
    use chrono::{TimeZone, Utc};
    use common::SystemClock;
    use event_store::InMemoryEventStore;

    fn service(purge: PurgeSettings) -> AppointmentService<InMemoryEventStore> {
        let directory = InMemoryDirectory::new();
        directory.add_patient(16).add_doctor(3);

        AppointmentService::new(
            InMemoryEventStore::new(),
            Arc::new(directory),
            Arc::new(SystemClock),
            DeferredTasks::new(),
        )
        .with_purge_settings(purge)
    }

    fn booking(initiator: Role) -> BookAppointment {
        BookAppointment::new(
            16,
            3,
            Utc.with_ymd_and_hms(2025, 5, 6, 12, 0, 0).unwrap(),
            initiator,
        )
    }

    #[tokio::test]
    async fn booking_requires_known_parties() {
        let service = service(PurgeSettings::default());

        let err = service
            .book(BookAppointment::new(99, 3, Utc::now(), Role::Patient))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("Patient"));

        let err = service
            .book(BookAppointment::new(16, 99, Utc::now(), Role::Patient))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Doctor"));
    }

    #[tokio::test]
    async fn book_confirm_and_reject_second_confirm() {
        let service = service(PurgeSettings::default());
        let cmd = booking(Role::Patient);
        let id = cmd.appointment_id;

        let booked = service.book(cmd).await.unwrap();
        assert_eq!(
            booked.aggregate.status(),
            AppointmentStatus::AwaitingDoctorConfirmation
        );

        service
            .confirm(ConfirmAppointment::new(id, Role::Doctor))
            .await
            .unwrap();
        assert_eq!(
            service.get(id).await.unwrap().status(),
            AppointmentStatus::Confirmed
        );

        let err = service
            .confirm(ConfirmAppointment::new(id, Role::Doctor))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }

    #[tokio::test]
    async fn operations_on_unknown_appointment_are_not_found() {
        let service = service(PurgeSettings::default());
        let id = AggregateId::new();

        let err = service
            .cancel(CancelAppointment::new(id))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = service.get(id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_appointment_is_purged_after_cooldown() {
        let service = service(PurgeSettings {
            cooldown: Duration::from_secs(20),
            policy: PurgePolicy::RequireCancelled,
        });
        let cmd = booking(Role::Doctor);
        let id = cmd.appointment_id;
        service.book(cmd).await.unwrap();

        let cancelled = service.cancel(CancelAppointment::new(id)).await.unwrap();
        assert_eq!(cancelled.aggregate.status(), AppointmentStatus::Cancelled);
        assert!(service.is_purge_armed(id));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(service.get(id).await.is_ok());

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(!service.is_purge_armed(id));
        assert_eq!(
            service.get(id).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn purge_check_skips_live_appointment() {
        let service = service(PurgeSettings::default());
        let cmd = booking(Role::Patient);
        let id = cmd.appointment_id;
        service.book(cmd).await.unwrap();

        service.purge(id).await.unwrap();
        assert!(service.get(id).await.is_ok());
    }

    #[tokio::test]
    async fn unconditional_purge_deletes_any_status() {
        let service = service(PurgeSettings {
            cooldown: Duration::from_secs(1),
            policy: PurgePolicy::Unconditional,
        });
        let cmd = booking(Role::Patient);
        let id = cmd.appointment_id;
        service.book(cmd).await.unwrap();

        service.purge(id).await.unwrap();
        assert!(service.get(id).await.is_err());

        // Purging something already gone is quiet.
        service.purge(id).await.unwrap();
    }

    #[tokio::test]
    async fn note_update_keeps_status() {
        let service = service(PurgeSettings::default());
        let cmd = booking(Role::Doctor);
        let id = cmd.appointment_id;
        service.book(cmd).await.unwrap();

        let result = service
            .update_note(UpdateNote::new(id, "bring previous x-rays"))
            .await
            .unwrap();

        assert_eq!(result.aggregate.note(), "bring previous x-rays");
        assert_eq!(
            result.aggregate.status(),
            AppointmentStatus::AwaitingPatientConfirmation
        );
    }
}
