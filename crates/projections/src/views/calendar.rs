//! Appointment calendar: appointments by patient, doctor and day.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::AggregateId;
use domain::{Aggregate, Appointment, AppointmentEvent, AppointmentStatus, DoctorId, PatientId};
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::Projection;

/// One live appointment as the calendar sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEntry {
    pub appointment_id: AggregateId,
    pub patient_id: PatientId,
    pub doctor_id: DoctorId,
    pub scheduled_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub note: String,
}

impl CalendarEntry {
    /// Confirmed and scheduled strictly before `now`.
    pub fn is_confirmed_past(&self, now: DateTime<Utc>) -> bool {
        self.status == AppointmentStatus::Confirmed && self.scheduled_at < now
    }
}

#[derive(Default)]
struct CalendarState {
    entries: HashMap<AggregateId, CalendarEntry>,
}

/// Calendar of live appointments. Deleted appointments drop out.
#[derive(Clone, Default)]
pub struct AppointmentCalendarView {
    state: Arc<RwLock<CalendarState>>,
}

impl AppointmentCalendarView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, appointment_id: AggregateId) -> Option<CalendarEntry> {
        self.state.read().await.entries.get(&appointment_id).cloned()
    }

    /// A patient's appointments, earliest first.
    pub async fn for_patient(&self, patient_id: PatientId) -> Vec<CalendarEntry> {
        self.select(|e| e.patient_id == patient_id).await
    }

    /// A doctor's appointments, earliest first.
    pub async fn for_doctor(&self, doctor_id: DoctorId) -> Vec<CalendarEntry> {
        self.select(|e| e.doctor_id == doctor_id).await
    }

    /// A doctor's appointments on one calendar day (UTC); the time of day is ignored.
    pub async fn for_doctor_on(&self, doctor_id: DoctorId, day: NaiveDate) -> Vec<CalendarEntry> {
        self.select(|e| e.doctor_id == doctor_id && e.scheduled_at.date_naive() == day)
            .await
    }

    pub async fn confirmed_past_count(
        &self,
        patient_id: PatientId,
        doctor_id: DoctorId,
        now: DateTime<Utc>,
    ) -> usize {
        self.state
            .read()
            .await
            .entries
            .values()
            .filter(|e| e.patient_id == patient_id && e.doctor_id == doctor_id)
            .filter(|e| e.is_confirmed_past(now))
            .count()
    }

    /// The most recent confirmed appointment before `now` for the pair.
    pub async fn latest_confirmed_past(
        &self,
        patient_id: PatientId,
        doctor_id: DoctorId,
        now: DateTime<Utc>,
    ) -> Option<CalendarEntry> {
        self.state
            .read()
            .await
            .entries
            .values()
            .filter(|e| e.patient_id == patient_id && e.doctor_id == doctor_id)
            .filter(|e| e.is_confirmed_past(now))
            .max_by_key(|e| (e.scheduled_at, e.appointment_id))
            .cloned()
    }

    async fn select(&self, predicate: impl Fn(&CalendarEntry) -> bool) -> Vec<CalendarEntry> {
        let state = self.state.read().await;
        let mut entries: Vec<_> = state
            .entries
            .values()
            .filter(|e| predicate(e))
            .cloned()
            .collect();
        entries.sort_by_key(|e| (e.scheduled_at, e.appointment_id));
        entries
    }
}

#[async_trait]
impl Projection for AppointmentCalendarView {
    fn name(&self) -> &'static str {
        "AppointmentCalendarView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut state = self.state.write().await;

        if event.aggregate_type != Appointment::aggregate_type() {
            return Ok(());
        }

        let appointment_event: AppointmentEvent = serde_json::from_value(event.payload.clone())?;
        let id = event.aggregate_id;

        match appointment_event {
            AppointmentEvent::AppointmentBooked(data) => {
                state.entries.insert(
                    id,
                    CalendarEntry {
                        appointment_id: id,
                        patient_id: data.patient_id,
                        doctor_id: data.doctor_id,
                        scheduled_at: data.scheduled_at,
                        status: data.status,
                        note: String::new(),
                    },
                );
            }
            AppointmentEvent::AppointmentRescheduled(data) => {
                if let Some(entry) = state.entries.get_mut(&id) {
                    entry.scheduled_at = data.scheduled_at;
                    entry.status = data.status;
                }
            }
            AppointmentEvent::AppointmentConfirmed(_) => {
                if let Some(entry) = state.entries.get_mut(&id) {
                    entry.status = AppointmentStatus::Confirmed;
                }
            }
            AppointmentEvent::AppointmentCancelled(_) => {
                if let Some(entry) = state.entries.get_mut(&id) {
                    entry.status = AppointmentStatus::Cancelled;
                }
            }
            AppointmentEvent::AppointmentNoteUpdated(data) => {
                if let Some(entry) = state.entries.get_mut(&id) {
                    entry.note = data.note;
                }
            }
            AppointmentEvent::AppointmentDeleted(_) => {
                state.entries.remove(&id);
            }
        }

        Ok(())
    }


    async fn reset(&self) -> Result<()> {
        *self.state.write().await = CalendarState::default();
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use domain::{DomainEvent, Role};
    use event_store::Version;

    fn envelope(id: AggregateId, version: i64, event: &AppointmentEvent) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(id)
            .aggregate_type("Appointment")
            .event_type(event.event_type())
            .version(Version::new(version))
            .payload(event)
            .unwrap()
            .build()
            .unwrap()
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, day, hour, 0, 0).unwrap()
    }

    async fn book(
        view: &AppointmentCalendarView,
        patient: i64,
        doctor: i64,
        when: DateTime<Utc>,
    ) -> AggregateId {
        let id = AggregateId::new();
        let booked = AppointmentEvent::booked(
            id,
            PatientId::new(patient),
            DoctorId::new(doctor),
            when,
            Role::Patient,
            at(1, 8),
        );
        view.handle(&envelope(id, 1, &booked)).await.unwrap();
        id
    }

    async fn confirm(view: &AppointmentCalendarView, id: AggregateId) {
        let confirmed = AppointmentEvent::confirmed(Role::Doctor, at(1, 9));
        view.handle(&envelope(id, 2, &confirmed)).await.unwrap();
    }

    #[tokio::test]
    async fn doctor_day_ignores_time_of_day() {
        let view = AppointmentCalendarView::new();
        book(&view, 1, 3, at(6, 8)).await;
        book(&view, 2, 3, at(6, 17)).await;
        book(&view, 1, 3, at(7, 8)).await;
        book(&view, 1, 4, at(6, 8)).await;

        let day = NaiveDate::from_ymd_opt(2025, 5, 6).unwrap();
        let entries = view.for_doctor_on(DoctorId::new(3), day).await;
        assert_eq!(entries.len(), 2);
        assert!(entries[0].scheduled_at < entries[1].scheduled_at);
        assert_eq!(view.for_doctor(DoctorId::new(3)).await.len(), 3);
        assert_eq!(view.for_patient(PatientId::new(1)).await.len(), 3);
    }

    #[tokio::test]
    async fn confirmed_past_queries() {
        let view = AppointmentCalendarView::new();
        let now = at(20, 12);

        let early = book(&view, 16, 3, at(2, 10)).await;
        let late = book(&view, 16, 3, at(10, 10)).await;
        let future = book(&view, 16, 3, now + Duration::days(3)).await;
        book(&view, 16, 3, at(5, 10)).await; // never confirmed
        for id in [early, late, future] {
            confirm(&view, id).await;
        }

        let (patient, doctor) = (PatientId::new(16), DoctorId::new(3));
        assert_eq!(view.confirmed_past_count(patient, doctor, now).await, 2);
        assert_eq!(
            view.latest_confirmed_past(patient, doctor, now)
                .await
                .map(|e| e.appointment_id),
            Some(late)
        );
        assert!(
            view.latest_confirmed_past(patient, DoctorId::new(9), now)
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn deleted_appointments_leave_the_calendar() {
        let view = AppointmentCalendarView::new();
        let id = book(&view, 1, 1, at(3, 9)).await;

        let cancelled = AppointmentEvent::cancelled(AppointmentStatus::AwaitingDoctorConfirmation, at(2, 9));
        view.handle(&envelope(id, 2, &cancelled)).await.unwrap();
        assert_eq!(view.get(id).await.unwrap().status, AppointmentStatus::Cancelled);

        let deleted = AppointmentEvent::deleted(AppointmentStatus::Cancelled, at(3, 9));
        view.handle(&envelope(id, 3, &deleted)).await.unwrap();
        assert!(view.get(id).await.is_none());
        assert!(view.for_patient(PatientId::new(1)).await.is_empty());
    }
}
