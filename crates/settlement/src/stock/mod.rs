//! Stock ledger trait and implementations.

mod memory;
mod postgres;

pub use memory::InMemoryStockLedger;
pub use postgres::PostgresStockLedger;

use async_trait::async_trait;
use domain::MedicationId;
use serde::Serialize;

use crate::error::StockError;

/// Outcome of a decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockChange {
    pub medication_id: MedicationId,
    pub previous: i64,
    pub current: i64,

    /// True when the requested amount exceeded the stock on hand.
    pub clamped: bool,
}

/// Per-medication stock levels. Levels never go below zero.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Takes `amount` units, stopping at zero. Atomic per medication.
    async fn decrement(
        &self,
        medication_id: MedicationId,
        amount: u32,
    ) -> Result<StockChange, StockError>;

    /// Adds `amount` units, creating the entry if needed. Returns the new level.
    async fn restock(&self, medication_id: MedicationId, amount: u32) -> Result<i64, StockError>;

    async fn level(&self, medication_id: MedicationId) -> Result<i64, StockError>;
}
