use domain::{Billing, MedicationId, Money};
use serde::Serialize;

/// A completed settlement.
#[derive(Debug, Clone, Serialize)]
pub struct Settlement {
    pub billing: Billing,

    /// Problems that did not stop the settlement.
    pub warnings: Vec<SettlementWarning>,
}

impl Settlement {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SettlementWarning {
    /// The ledger could not record the decrement at all.
    StockDecrementFailed {
        medication_id: MedicationId,
        quantity: u32,
        reason: String,
    },

    /// Less stock was available than was sold; the level stopped at zero.
    StockClamped {
        medication_id: MedicationId,
        requested: u32,
        available: i64,
    },

    /// The caller expected a different amount than the cart total.
    AmountMismatch { requested: Money, charged: Money },
}

impl std::fmt::Display for SettlementWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettlementWarning::StockDecrementFailed {
                medication_id,
                quantity,
                reason,
            } => write!(
                f,
                "could not take {quantity} of medication {medication_id} from stock: {reason}"
            ),
            SettlementWarning::StockClamped {
                medication_id,
                requested,
                available,
            } => write!(
                f,
                "medication {medication_id} had {available} in stock, {requested} sold"
            ),
            SettlementWarning::AmountMismatch { requested, charged } => {
                write!(f, "requested amount {requested} differs from cart total {charged}")
            }
        }
    }
}
