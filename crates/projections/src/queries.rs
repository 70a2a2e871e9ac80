//! Query facades that bring their views up to date before answering.

use std::sync::Arc;

use chrono::NaiveDate;
use common::{AggregateId, Clock};
use domain::{DoctorId, PatientId};
use event_store::EventStore;

use crate::Result;
use crate::processor::ProjectionProcessor;
use crate::views::{AppointmentCalendarView, BillingEntry, BillingLedgerView, CalendarEntry};

/// Both query facades, sharing one processor over the store.
pub struct ReadSide<S: EventStore> {
    pub appointments: AppointmentQueries<S>,
    pub billings: BillingQueries<S>,
}

impl<S: EventStore> ReadSide<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        let calendar = AppointmentCalendarView::new();
        let ledger = BillingLedgerView::new();
        let processor = Arc::new(
            ProjectionProcessor::new(store)
                .with(calendar.clone())
                .with(ledger.clone()),
        );

        Self {
            appointments: AppointmentQueries {
                processor: processor.clone(),
                calendar,
                clock,
            },
            billings: BillingQueries { processor, ledger },
        }
    }
}

/// Read-only appointment lookups backed by the calendar view.
pub struct AppointmentQueries<S: EventStore> {
    processor: Arc<ProjectionProcessor<S>>,
    calendar: AppointmentCalendarView,
    clock: Arc<dyn Clock>,
}

impl<S: EventStore> AppointmentQueries<S> {
    pub async fn by_patient(&self, patient_id: PatientId) -> Result<Vec<CalendarEntry>> {
        self.processor.run_catch_up().await?;
        Ok(self.calendar.for_patient(patient_id).await)
    }

    pub async fn by_doctor(&self, doctor_id: DoctorId) -> Result<Vec<CalendarEntry>> {
        self.processor.run_catch_up().await?;
        Ok(self.calendar.for_doctor(doctor_id).await)
    }

    pub async fn by_doctor_on(
        &self,
        doctor_id: DoctorId,
        day: NaiveDate,
    ) -> Result<Vec<CalendarEntry>> {
        self.processor.run_catch_up().await?;
        Ok(self.calendar.for_doctor_on(doctor_id, day).await)
    }

    /// Confirmed appointments of the pair scheduled before the current time.
    pub async fn confirmed_past_count(
        &self,
        patient_id: PatientId,
        doctor_id: DoctorId,
    ) -> Result<usize> {
        self.processor.run_catch_up().await?;
        Ok(self
            .calendar
            .confirmed_past_count(patient_id, doctor_id, self.clock.now())
            .await)
    }

    pub async fn latest_confirmed_past(
        &self,
        patient_id: PatientId,
        doctor_id: DoctorId,
    ) -> Result<Option<CalendarEntry>> {
        self.processor.run_catch_up().await?;
        Ok(self
            .calendar
            .latest_confirmed_past(patient_id, doctor_id, self.clock.now())
            .await)
    }
}

/// Read-only billing lookups backed by the billing ledger.
pub struct BillingQueries<S: EventStore> {
    processor: Arc<ProjectionProcessor<S>>,
    ledger: BillingLedgerView,
}

impl<S: EventStore> BillingQueries<S> {
    pub async fn list(&self) -> Result<Vec<BillingEntry>> {
        self.processor.run_catch_up().await?;
        Ok(self.ledger.list().await)
    }

    pub async fn by_order_ref(&self, order_ref: &str) -> Result<Vec<BillingEntry>> {
        self.processor.run_catch_up().await?;
        Ok(self.ledger.by_order_ref(order_ref).await)
    }

    pub async fn for_cart(&self, cart_id: AggregateId) -> Result<Option<BillingEntry>> {
        self.processor.run_catch_up().await?;
        Ok(self.ledger.for_cart(cart_id).await)
    }
}
