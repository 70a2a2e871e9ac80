use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::Money;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BillingEvent {
    BillingCreated(BillingCreatedData),
    BillingCartReferenceChanged(BillingCartReferenceChangedData),
    BillingDeleted(BillingDeletedData),
}

impl DomainEvent for BillingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BillingEvent::BillingCreated(_) => "BillingCreated",
            BillingEvent::BillingCartReferenceChanged(_) => "BillingCartReferenceChanged",
            BillingEvent::BillingDeleted(_) => "BillingDeleted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingCreatedData {
    pub billing_id: AggregateId,
    pub cart_id: AggregateId,
    pub order_ref: Option<String>,
    pub amount: Money,
    pub payment_method: String,
    pub billed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingCartReferenceChangedData {
    pub previous_cart_id: Option<AggregateId>,
    pub cart_id: AggregateId,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingDeletedData {
    pub cart_id: Option<AggregateId>,
    pub deleted_at: DateTime<Utc>,
}
