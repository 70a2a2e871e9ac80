//! One stream per patient recording which cart is the patient's open cart.
//!
//! The stream id is derived from the patient id, so two servers opening a
//! cart for the same patient race on the same stream version and only one
//! of them can win.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::value_objects::PatientId;

use super::CartError;

/// Returns the registry stream id for a patient.
pub fn registry_id(patient_id: PatientId) -> AggregateId {
    AggregateId::derived("patient-cart", patient_id)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PatientCartEvent {
    OpenCartAssigned(OpenCartAssignedData),
    OpenCartReleased(OpenCartReleasedData),
}

impl DomainEvent for PatientCartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PatientCartEvent::OpenCartAssigned(_) => "OpenCartAssigned",
            PatientCartEvent::OpenCartReleased(_) => "OpenCartReleased",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenCartAssignedData {
    pub patient_id: PatientId,
    pub cart_id: AggregateId,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenCartReleasedData {
    pub cart_id: AggregateId,
    pub released_at: DateTime<Utc>,
}

/// The open-cart slot of a single patient.
#[derive(Debug, Clone, Default)]
pub struct PatientCartRegistry {
    id: Option<AggregateId>,
    version: Version,
    patient_id: PatientId,
    open_cart: Option<AggregateId>,
}

impl Aggregate for PatientCartRegistry {
    type Event = PatientCartEvent;
    type Error = CartError;

    fn aggregate_type() -> &'static str {
        "PatientCartRegistry"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            PatientCartEvent::OpenCartAssigned(data) => {
                self.id = Some(registry_id(data.patient_id));
                self.patient_id = data.patient_id;
                self.open_cart = Some(data.cart_id);
            }
            PatientCartEvent::OpenCartReleased(data) => {
                if self.open_cart == Some(data.cart_id) {
                    self.open_cart = None;
                }
            }
        }
    }
}

impl PatientCartRegistry {
    pub fn open_cart(&self) -> Option<AggregateId> {
        self.open_cart
    }

    /// Claims the empty slot for `cart_id`.
    pub fn assign(
        &self,
        patient_id: PatientId,
        cart_id: AggregateId,
        now: DateTime<Utc>,
    ) -> Result<Vec<PatientCartEvent>, CartError> {
        if let Some(current) = self.open_cart {
            return Err(CartError::OpenCartExists { cart_id: current });
        }
        Ok(vec![assigned(patient_id, cart_id, now)])
    }

    /// Frees the slot if it holds `cart_id`; otherwise nothing happens.
    pub fn release(
        &self,
        cart_id: AggregateId,
        now: DateTime<Utc>,
    ) -> Result<Vec<PatientCartEvent>, CartError> {
        if self.open_cart == Some(cart_id) {
            Ok(vec![PatientCartEvent::OpenCartReleased(OpenCartReleasedData {
                cart_id,
                released_at: now,
            })])
        } else {
            Ok(vec![])
        }
    }

    /// Points the slot at `cart_id`, releasing whatever cart it held.
    ///
    /// Used when the registered cart turned out to be paid or deleted.
    pub fn replace(
        &self,
        patient_id: PatientId,
        cart_id: AggregateId,
        now: DateTime<Utc>,
    ) -> Result<Vec<PatientCartEvent>, CartError> {
        let mut events = match self.open_cart {
            Some(current) if current == cart_id => return Ok(vec![]),
            Some(current) => self.release(current, now)?,
            None => vec![],
        };
        events.push(assigned(patient_id, cart_id, now));
        Ok(events)
    }
}

fn assigned(patient_id: PatientId, cart_id: AggregateId, now: DateTime<Utc>) -> PatientCartEvent {
    PatientCartEvent::OpenCartAssigned(OpenCartAssignedData {
        patient_id,
        cart_id,
        assigned_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(cart_id: AggregateId) -> PatientCartRegistry {
        let mut registry = PatientCartRegistry::default();
        let events = registry
            .assign(PatientId::new(7), cart_id, Utc::now())
            .unwrap();
        registry.apply_events(events);
        registry
    }

    #[test]
    fn registry_id_is_stable_per_patient() {
        assert_eq!(registry_id(PatientId::new(7)), registry_id(PatientId::new(7)));
        assert_ne!(registry_id(PatientId::new(7)), registry_id(PatientId::new(8)));
    }

    #[test]
    fn occupied_slot_rejects_second_assignment() {
        let first = AggregateId::new();
        let registry = registry_with(first);

        assert_eq!(registry.id(), Some(registry_id(PatientId::new(7))));
        assert!(matches!(
            registry.assign(PatientId::new(7), AggregateId::new(), Utc::now()),
            Err(CartError::OpenCartExists { cart_id }) if cart_id == first
        ));
    }

    #[test]
    fn release_ignores_other_carts() {
        let cart_id = AggregateId::new();
        let mut registry = registry_with(cart_id);

        assert!(
            registry
                .release(AggregateId::new(), Utc::now())
                .unwrap()
                .is_empty()
        );

        let events = registry.release(cart_id, Utc::now()).unwrap();
        registry.apply_events(events);
        assert_eq!(registry.open_cart(), None);
    }

    #[test]
    fn replace_releases_stale_cart() {
        let stale = AggregateId::new();
        let fresh = AggregateId::new();
        let mut registry = registry_with(stale);

        let events = registry.replace(PatientId::new(7), fresh, Utc::now()).unwrap();
        assert_eq!(events.len(), 2);
        registry.apply_events(events);
        assert_eq!(registry.open_cart(), Some(fresh));
    }
}
