//! Cart domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::{CartLine, MedicationId, Money, PatientId};

/// Events that can occur on a cart aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CartEvent {
    CartOpened(CartOpenedData),

    /// Lines merged into the cart; existing lines keep their unit price.
    LinesAdded(LinesAddedData),

    /// All lines replaced and the total recomputed.
    LinesReplaced(LinesReplacedData),

    LineRemoved(LineRemovedData),
    LineQuantityUpdated(LineQuantityUpdatedData),
    CartPaid(CartPaidData),
    CartPaymentReverted(CartPaymentRevertedData),
    CartDeleted(CartDeletedData),
}

impl DomainEvent for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::CartOpened(_) => "CartOpened",
            CartEvent::LinesAdded(_) => "LinesAdded",
            CartEvent::LinesReplaced(_) => "LinesReplaced",
            CartEvent::LineRemoved(_) => "LineRemoved",
            CartEvent::LineQuantityUpdated(_) => "LineQuantityUpdated",
            CartEvent::CartPaid(_) => "CartPaid",
            CartEvent::CartPaymentReverted(_) => "CartPaymentReverted",
            CartEvent::CartDeleted(_) => "CartDeleted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartOpenedData {
    pub cart_id: AggregateId,
    pub patient_id: PatientId,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinesAddedData {
    pub lines: Vec<CartLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinesReplacedData {
    pub lines: Vec<CartLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineRemovedData {
    pub medication_id: MedicationId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineQuantityUpdatedData {
    pub medication_id: MedicationId,
    pub old_quantity: u32,
    pub new_quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartPaidData {
    pub billing_id: AggregateId,
    pub amount: Money,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartPaymentRevertedData {
    pub billing_id: AggregateId,
    pub reverted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartDeletedData {
    pub was_paid: bool,
    pub deleted_at: DateTime<Utc>,
}

// Factory methods
impl CartEvent {
    pub fn opened(cart_id: AggregateId, patient_id: PatientId, opened_at: DateTime<Utc>) -> Self {
        CartEvent::CartOpened(CartOpenedData {
            cart_id,
            patient_id,
            opened_at,
        })
    }

    pub fn lines_added(lines: Vec<CartLine>) -> Self {
        CartEvent::LinesAdded(LinesAddedData { lines })
    }

    pub fn lines_replaced(lines: Vec<CartLine>) -> Self {
        CartEvent::LinesReplaced(LinesReplacedData { lines })
    }

    pub fn line_removed(medication_id: MedicationId) -> Self {
        CartEvent::LineRemoved(LineRemovedData { medication_id })
    }

    pub fn line_quantity_updated(
        medication_id: MedicationId,
        old_quantity: u32,
        new_quantity: u32,
    ) -> Self {
        CartEvent::LineQuantityUpdated(LineQuantityUpdatedData {
            medication_id,
            old_quantity,
            new_quantity,
        })
    }

    pub fn paid(billing_id: AggregateId, amount: Money, paid_at: DateTime<Utc>) -> Self {
        CartEvent::CartPaid(CartPaidData {
            billing_id,
            amount,
            paid_at,
        })
    }

    pub fn payment_reverted(billing_id: AggregateId, reverted_at: DateTime<Utc>) -> Self {
        CartEvent::CartPaymentReverted(CartPaymentRevertedData {
            billing_id,
            reverted_at,
        })
    }

    pub fn deleted(was_paid: bool, deleted_at: DateTime<Utc>) -> Self {
        CartEvent::CartDeleted(CartDeletedData {
            was_paid,
            deleted_at,
        })
    }
}
