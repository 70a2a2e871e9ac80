//! Medication catalog gateway.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::value_objects::{MedicationId, Money};

/// A sellable medication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
    pub id: MedicationId,
    pub name: String,
    pub unit_price: Money,
}

impl Medication {
    pub fn new(id: impl Into<MedicationId>, name: impl Into<String>, unit_price: Money) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            unit_price,
        }
    }
}

/// Lookup of medications and their current unit price.
#[async_trait]
pub trait MedicationCatalog: Send + Sync {
    async fn find(&self, id: MedicationId) -> Option<Medication>;
}

/// In-memory catalog for tests and the demo server.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    medications: Arc<RwLock<HashMap<MedicationId, Medication>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a medication.
    pub fn insert(&self, medication: Medication) -> &Self {
        self.medications
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(medication.id, medication);
        self
    }

    pub fn remove(&self, id: MedicationId) -> Option<Medication> {
        self.medications
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }
}

#[async_trait]
impl MedicationCatalog for InMemoryCatalog {
    async fn find(&self, id: MedicationId) -> Option<Medication> {
        self.medications
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn price_changes_replace_entry() {
        let catalog = InMemoryCatalog::new();
        catalog.insert(Medication::new(1, "Amoxicillin", Money::from_cents(500)));
        catalog.insert(Medication::new(1, "Amoxicillin", Money::from_cents(650)));

        let found = catalog.find(MedicationId::new(1)).await.unwrap();
        assert_eq!(found.unit_price, Money::from_cents(650));
        assert!(catalog.find(MedicationId::new(2)).await.is_none());
    }
}
