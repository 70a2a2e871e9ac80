//! Seeding endpoints for the in-process directory, catalog and stock.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::{Medication, MedicationId, Money};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PersonRequest {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct MedicationRequest {
    pub id: i64,
    pub name: String,
    pub unit_price_cents: i64,
}

#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct StockLevelResponse {
    pub medication_id: MedicationId,
    pub quantity: i64,
}

/// POST /directory/patients
pub async fn add_patient<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<PersonRequest>,
) -> StatusCode {
    state.directory.add_patient(req.id);
    StatusCode::NO_CONTENT
}

/// POST /directory/doctors
pub async fn add_doctor<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<PersonRequest>,
) -> StatusCode {
    state.directory.add_doctor(req.id);
    StatusCode::NO_CONTENT
}

/// PUT /medications: add or reprice a medication. Lines already in carts keep their price.
pub async fn upsert_medication<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<MedicationRequest>,
) -> Result<Json<Medication>, ApiError> {
    if req.unit_price_cents < 0 {
        return Err(ApiError::BadRequest(
            "unit_price_cents must not be negative".to_string(),
        ));
    }

    let medication = Medication::new(req.id, req.name, Money::from_cents(req.unit_price_cents));
    state.catalog.insert(medication.clone());
    Ok(Json(medication))
}

/// GET /stock/{medication_id}
#[tracing::instrument(skip(state))]
pub async fn stock_level<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(medication_id): Path<i64>,
) -> Result<Json<StockLevelResponse>, ApiError> {
    let medication_id = MedicationId::new(medication_id);
    let quantity = state.settlement.stock().level(medication_id).await?;
    Ok(Json(StockLevelResponse {
        medication_id,
        quantity,
    }))
}

/// POST /stock/{medication_id}/restock
#[tracing::instrument(skip(state, req))]
pub async fn restock<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(medication_id): Path<i64>,
    Json(req): Json<RestockRequest>,
) -> Result<Json<StockLevelResponse>, ApiError> {
    let medication_id = MedicationId::new(medication_id);
    let quantity = state
        .settlement
        .stock()
        .restock(medication_id, req.quantity)
        .await?;
    Ok(Json(StockLevelResponse {
        medication_id,
        quantity,
    }))
}
