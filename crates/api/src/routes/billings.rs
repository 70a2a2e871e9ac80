//! Settlement and billing endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use domain::{Aggregate, Billing, Money};
use event_store::EventStore;
use projections::BillingEntry;
use serde::{Deserialize, Serialize};
use settlement::{SettleCart, SettlementWarning};

use super::parse_aggregate_id;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct SettleRequest {
    pub payment_method: String,
    pub order_ref: Option<String>,

    /// What the client thinks it is paying; a mismatch is reported, not rejected.
    pub amount_cents: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeCartRequest {
    pub cart_id: String,
}

#[derive(Debug, Deserialize)]
pub struct BillingFilter {
    pub order_ref: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct BillingResponse {
    pub id: String,
    pub cart_id: Option<String>,
    pub order_ref: Option<String>,
    pub amount_cents: i64,
    pub payment_method: String,
    pub billed_at: Option<DateTime<Utc>>,
}

impl From<&Billing> for BillingResponse {
    fn from(billing: &Billing) -> Self {
        Self {
            id: billing.id().map(|id| id.to_string()).unwrap_or_default(),
            cart_id: billing.cart_id().map(|id| id.to_string()),
            order_ref: billing.order_ref().map(String::from),
            amount_cents: billing.amount().cents(),
            payment_method: billing.payment_method().to_string(),
            billed_at: billing.billed_at(),
        }
    }
}

#[derive(Serialize)]
pub struct SettlementResponse {
    pub billing: BillingResponse,
    pub warnings: Vec<SettlementWarning>,
}

// -- Handlers --

/// POST /carts/{id}/settle: pay the cart and record its billing.
#[tracing::instrument(skip(state, req))]
pub async fn settle<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<SettleRequest>,
) -> Result<(StatusCode, Json<SettlementResponse>), ApiError> {
    let cart_id = parse_aggregate_id(&id)?;

    let mut cmd = SettleCart::new(cart_id, req.payment_method);
    if let Some(order_ref) = req.order_ref {
        cmd = cmd.with_order_ref(order_ref);
    }
    if let Some(cents) = req.amount_cents {
        cmd = cmd.with_amount(Money::from_cents(cents));
    }

    let settlement = state.settlement.settle(cmd).await?;
    Ok((
        StatusCode::CREATED,
        Json(SettlementResponse {
            billing: BillingResponse::from(&settlement.billing),
            warnings: settlement.warnings,
        }),
    ))
}

/// GET /billings: every live billing, or those for `?order_ref=...`.
#[tracing::instrument(skip(state))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(filter): Query<BillingFilter>,
) -> Result<Json<Vec<BillingEntry>>, ApiError> {
    let entries = match filter.order_ref {
        Some(order_ref) => state.read.billings.by_order_ref(&order_ref).await?,
        None => state.read.billings.list().await?,
    };
    Ok(Json(entries))
}

/// GET /billings/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<BillingResponse>, ApiError> {
    let billing_id = parse_aggregate_id(&id)?;
    let billing = state.settlement.get_billing(billing_id).await?;
    Ok(Json(BillingResponse::from(&billing)))
}

/// DELETE /billings/{id}: delete the billing and reopen its cart.
#[tracing::instrument(skip(state))]
pub async fn revert<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let billing_id = parse_aggregate_id(&id)?;
    state.settlement.revert_settlement(billing_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /billings/{id}/cart: move the billing onto another cart.
#[tracing::instrument(skip(state, req))]
pub async fn change_cart<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<ChangeCartRequest>,
) -> Result<Json<BillingResponse>, ApiError> {
    let billing_id = parse_aggregate_id(&id)?;
    let cart_id = parse_aggregate_id(&req.cart_id)?;
    let billing = state
        .settlement
        .change_cart_reference(billing_id, cart_id)
        .await?;
    Ok(Json(BillingResponse::from(&billing)))
}
