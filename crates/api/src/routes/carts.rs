//! Cart endpoints: the patient's open cart and its medication lines.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::{Aggregate, Cart, CartLine, LineRequest, MedicationId, PatientId};
use event_store::EventStore;
use serde::{Deserialize, Serialize};
use settlement::PaymentIntent;

use super::parse_aggregate_id;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct LinesRequest {
    pub lines: Vec<LineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartResponse {
    pub id: String,
    pub patient_id: PatientId,
    pub lines: Vec<CartLineResponse>,
    pub total_cents: i64,
    pub paid: bool,
    pub billing_id: Option<String>,
}

#[derive(Serialize)]
pub struct CartLineResponse {
    pub medication_id: MedicationId,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub total_cents: i64,
}

impl From<&CartLine> for CartLineResponse {
    fn from(line: &CartLine) -> Self {
        Self {
            medication_id: line.medication_id,
            quantity: line.quantity,
            unit_price_cents: line.unit_price.cents(),
            total_cents: line.total_price().cents(),
        }
    }
}

impl From<&Cart> for CartResponse {
    fn from(cart: &Cart) -> Self {
        Self {
            id: cart.id().map(|id| id.to_string()).unwrap_or_default(),
            patient_id: cart.patient_id(),
            lines: cart.lines().map(CartLineResponse::from).collect(),
            total_cents: cart.total().cents(),
            paid: cart.is_paid(),
            billing_id: cart.billing_id().map(|id| id.to_string()),
        }
    }
}

#[derive(Serialize)]
pub struct PaymentIntentResponse {
    pub intent_id: String,
    pub client_secret: String,
    pub cart_id: String,
    pub amount_cents: i64,
}

impl From<PaymentIntent> for PaymentIntentResponse {
    fn from(intent: PaymentIntent) -> Self {
        Self {
            intent_id: intent.intent_id,
            client_secret: intent.client_secret,
            cart_id: intent.cart_id.to_string(),
            amount_cents: intent.amount.cents(),
        }
    }
}

// -- Handlers --

/// POST /patients/{id}/cart: return the patient's open cart, opening one if needed.
#[tracing::instrument(skip(state))]
pub async fn open_for_patient<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(patient_id): Path<i64>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state
        .carts
        .get_or_create_open_cart(PatientId::new(patient_id))
        .await?;
    Ok(Json(CartResponse::from(&cart)))
}

/// GET /carts/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart_id = parse_aggregate_id(&id)?;
    let cart = state.carts.get_cart(cart_id).await?;
    Ok(Json(CartResponse::from(&cart)))
}

/// POST /carts/{id}/lines: add lines, merging quantities of medications already present.
#[tracing::instrument(skip(state, req))]
pub async fn add_lines<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<LinesRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart_id = parse_aggregate_id(&id)?;
    let result = state.carts.add_lines(cart_id, req.lines).await?;
    Ok(Json(CartResponse::from(&result.aggregate)))
}

/// PUT /carts/{id}/lines: replace every line.
#[tracing::instrument(skip(state, req))]
pub async fn replace_lines<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<LinesRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart_id = parse_aggregate_id(&id)?;
    let result = state.carts.replace_lines(cart_id, req.lines).await?;
    Ok(Json(CartResponse::from(&result.aggregate)))
}

/// PATCH /carts/{id}/lines/{medication_id}: set a line's quantity; zero removes it.
#[tracing::instrument(skip(state, req))]
pub async fn update_line_quantity<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((id, medication_id)): Path<(String, i64)>,
    Json(req): Json<QuantityRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart_id = parse_aggregate_id(&id)?;
    let result = state
        .carts
        .update_line_quantity(cart_id, MedicationId::new(medication_id), req.quantity)
        .await?;
    Ok(Json(CartResponse::from(&result.aggregate)))
}

/// DELETE /carts/{id}/lines/{medication_id}
#[tracing::instrument(skip(state))]
pub async fn remove_line<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((id, medication_id)): Path<(String, i64)>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart_id = parse_aggregate_id(&id)?;
    let result = state
        .carts
        .remove_line(cart_id, MedicationId::new(medication_id))
        .await?;
    Ok(Json(CartResponse::from(&result.aggregate)))
}

/// DELETE /carts/{id}
#[tracing::instrument(skip(state))]
pub async fn delete<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let cart_id = parse_aggregate_id(&id)?;
    state.carts.delete_cart(cart_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /carts/{id}/payment-intent: ask the provider for an intent over the cart total.
#[tracing::instrument(skip(state))]
pub async fn payment_intent<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<PaymentIntentResponse>), ApiError> {
    let cart_id = parse_aggregate_id(&id)?;
    let intent = state.settlement.prepare_payment(cart_id).await?;
    Ok((StatusCode::CREATED, Json(PaymentIntentResponse::from(intent))))
}
