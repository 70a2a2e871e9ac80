//! Patient and doctor directory gateway.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::value_objects::{DoctorId, PatientId};

/// Existence checks against the clinic's people records.
#[async_trait]
pub trait ClinicDirectory: Send + Sync {
    async fn has_patient(&self, id: PatientId) -> bool;

    async fn has_doctor(&self, id: DoctorId) -> bool;
}

#[derive(Debug, Default)]
struct Registered {
    patients: HashSet<PatientId>,
    doctors: HashSet<DoctorId>,
}

/// In-memory directory for tests and the demo server.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    registered: Arc<RwLock<Registered>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_patient(&self, id: impl Into<PatientId>) -> &Self {
        self.registered
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .patients
            .insert(id.into());
        self
    }

    pub fn add_doctor(&self, id: impl Into<DoctorId>) -> &Self {
        self.registered
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .doctors
            .insert(id.into());
        self
    }
}

#[async_trait]
impl ClinicDirectory for InMemoryDirectory {
    async fn has_patient(&self, id: PatientId) -> bool {
        self.registered
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .patients
            .contains(&id)
    }

    async fn has_doctor(&self, id: DoctorId) -> bool {
        self.registered
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .doctors
            .contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registered_people_are_found() {
        let directory = InMemoryDirectory::new();
        directory.add_patient(16).add_doctor(3);

        assert!(directory.has_patient(PatientId::new(16)).await);
        assert!(directory.has_doctor(DoctorId::new(3)).await);
        assert!(!directory.has_patient(PatientId::new(3)).await);
        assert!(!directory.has_doctor(DoctorId::new(16)).await);
    }
}
