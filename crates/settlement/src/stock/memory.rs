use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use domain::MedicationId;

use super::{StockChange, StockLedger};
use crate::error::StockError;

#[derive(Debug, Default)]
struct InMemoryStockState {
    levels: HashMap<MedicationId, i64>,
    fail_on_decrement: bool,
}

/// In-memory stock ledger; one mutex guards every level.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStockLedger {
    state: Arc<Mutex<InMemoryStockState>>,
}

impl InMemoryStockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the level of a medication, replacing any previous value.
    pub fn with_stock(self, medication_id: impl Into<MedicationId>, quantity: i64) -> Self {
        self.lock()
            .levels
            .insert(medication_id.into(), quantity.max(0));
        self
    }

    /// Makes every decrement fail until switched off again.
    pub fn set_fail_on_decrement(&self, fail: bool) {
        self.lock().fail_on_decrement = fail;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InMemoryStockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StockLedger for InMemoryStockLedger {
    async fn decrement(
        &self,
        medication_id: MedicationId,
        amount: u32,
    ) -> Result<StockChange, StockError> {
        let mut state = self.lock();

        if state.fail_on_decrement {
            return Err(StockError::Unavailable("stock ledger offline".to_string()));
        }

        let level = state
            .levels
            .get_mut(&medication_id)
            .ok_or(StockError::UnknownMedication(medication_id))?;

        let previous = *level;
        *level = (previous - i64::from(amount)).max(0);

        Ok(StockChange {
            medication_id,
            previous,
            current: *level,
            clamped: previous < i64::from(amount),
        })
    }

    async fn restock(&self, medication_id: MedicationId, amount: u32) -> Result<i64, StockError> {
        let mut state = self.lock();
        let level = state.levels.entry(medication_id).or_insert(0);
        *level += i64::from(amount);
        Ok(*level)
    }

    async fn level(&self, medication_id: MedicationId) -> Result<i64, StockError> {
        self.lock()
            .levels
            .get(&medication_id)
            .copied()
            .ok_or(StockError::UnknownMedication(medication_id))
    }
}
