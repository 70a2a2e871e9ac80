//! Appointment booking, confirmation and calendar endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, Utc};
use domain::{
    Aggregate, Appointment, AppointmentStatus, BookAppointment, CancelAppointment,
    ConfirmAppointment, DoctorId, PatientId, RescheduleAppointment, Role, UpdateNote,
};
use event_store::EventStore;
use projections::CalendarEntry;
use serde::{Deserialize, Serialize};

use super::parse_aggregate_id;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct BookRequest {
    pub patient_id: i64,
    pub doctor_id: i64,
    pub scheduled_at: DateTime<Utc>,
    pub initiator: Role,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub scheduled_at: DateTime<Utc>,
    pub initiator: Role,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub note: String,
}

#[derive(Debug, Deserialize)]
pub struct DayFilter {
    pub date: Option<NaiveDate>,
}

// -- Response types --

#[derive(Serialize)]
pub struct AppointmentResponse {
    pub id: String,
    pub patient_id: PatientId,
    pub doctor_id: DoctorId,
    pub scheduled_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub note: String,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl From<&Appointment> for AppointmentResponse {
    fn from(appointment: &Appointment) -> Self {
        Self {
            id: appointment.id().map(|id| id.to_string()).unwrap_or_default(),
            patient_id: appointment.patient_id(),
            doctor_id: appointment.doctor_id(),
            scheduled_at: appointment.scheduled_at(),
            status: appointment.status(),
            note: appointment.note().to_string(),
            cancelled_at: appointment.cancelled_at(),
        }
    }
}

#[derive(Serialize)]
pub struct VisitHistoryResponse {
    pub confirmed_past_count: usize,
    pub latest: Option<CalendarEntry>,
}

// -- Handlers --

/// POST /appointments: book an appointment; the other party has to confirm.
#[tracing::instrument(skip(state, req))]
pub async fn book<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<BookRequest>,
) -> Result<(StatusCode, Json<AppointmentResponse>), ApiError> {
    let cmd = BookAppointment::new(req.patient_id, req.doctor_id, req.scheduled_at, req.initiator);
    let result = state.appointments.book(cmd).await?;
    Ok((
        StatusCode::CREATED,
        Json(AppointmentResponse::from(&result.aggregate)),
    ))
}

/// GET /appointments/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let appointment_id = parse_aggregate_id(&id)?;
    let appointment = state.appointments.get(appointment_id).await?;
    Ok(Json(AppointmentResponse::from(&appointment)))
}

/// POST /appointments/{id}/reschedule
#[tracing::instrument(skip(state, req))]
pub async fn reschedule<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<RescheduleRequest>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let appointment_id = parse_aggregate_id(&id)?;
    let result = state
        .appointments
        .reschedule(RescheduleAppointment::new(
            appointment_id,
            req.scheduled_at,
            req.initiator,
        ))
        .await?;
    Ok(Json(AppointmentResponse::from(&result.aggregate)))
}

/// POST /appointments/{id}/confirm
#[tracing::instrument(skip(state, req))]
pub async fn confirm<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let appointment_id = parse_aggregate_id(&id)?;
    let result = state
        .appointments
        .confirm(ConfirmAppointment::new(appointment_id, req.role))
        .await?;
    Ok(Json(AppointmentResponse::from(&result.aggregate)))
}

/// POST /appointments/{id}/cancel: cancel and schedule the purge.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let appointment_id = parse_aggregate_id(&id)?;
    let result = state
        .appointments
        .cancel(CancelAppointment::new(appointment_id))
        .await?;
    Ok(Json(AppointmentResponse::from(&result.aggregate)))
}

/// PUT /appointments/{id}/note
#[tracing::instrument(skip(state, req))]
pub async fn update_note<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<NoteRequest>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let appointment_id = parse_aggregate_id(&id)?;
    let result = state
        .appointments
        .update_note(UpdateNote::new(appointment_id, req.note))
        .await?;
    Ok(Json(AppointmentResponse::from(&result.aggregate)))
}

/// GET /patients/{id}/appointments
#[tracing::instrument(skip(state))]
pub async fn for_patient<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(patient_id): Path<i64>,
) -> Result<Json<Vec<CalendarEntry>>, ApiError> {
    let entries = state
        .read
        .appointments
        .by_patient(PatientId::new(patient_id))
        .await?;
    Ok(Json(entries))
}

/// GET /doctors/{id}/appointments, optionally narrowed with `?date=YYYY-MM-DD`.
#[tracing::instrument(skip(state))]
pub async fn for_doctor<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(doctor_id): Path<i64>,
    Query(filter): Query<DayFilter>,
) -> Result<Json<Vec<CalendarEntry>>, ApiError> {
    let doctor_id = DoctorId::new(doctor_id);
    let entries = match filter.date {
        Some(day) => state.read.appointments.by_doctor_on(doctor_id, day).await?,
        None => state.read.appointments.by_doctor(doctor_id).await?,
    };
    Ok(Json(entries))
}

/// GET /patients/{id}/doctors/{doctor_id}/history: past confirmed visits.
#[tracing::instrument(skip(state))]
pub async fn visit_history<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((patient_id, doctor_id)): Path<(i64, i64)>,
) -> Result<Json<VisitHistoryResponse>, ApiError> {
    let patient_id = PatientId::new(patient_id);
    let doctor_id = DoctorId::new(doctor_id);

    let confirmed_past_count = state
        .read
        .appointments
        .confirmed_past_count(patient_id, doctor_id)
        .await?;
    let latest = state
        .read
        .appointments
        .latest_confirmed_past(patient_id, doctor_id)
        .await?;

    Ok(Json(VisitHistoryResponse {
        confirmed_past_count,
        latest,
    }))
}
