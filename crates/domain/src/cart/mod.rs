//! Cart aggregate, the per-patient open-cart registry and the cart service.

mod aggregate;
mod events;
mod registry;
mod service;

pub use aggregate::Cart;
pub use events::{
    CartDeletedData, CartEvent, CartOpenedData, CartPaidData, CartPaymentRevertedData,
    LineQuantityUpdatedData, LineRemovedData, LinesAddedData, LinesReplacedData,
};
pub use registry::{
    OpenCartAssignedData, OpenCartReleasedData, PatientCartEvent, PatientCartRegistry,
    registry_id,
};
pub use service::CartService;

use common::AggregateId;
use thiserror::Error;

use crate::error::ErrorKind;
use crate::value_objects::MedicationId;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("Cart is already paid")]
    AlreadyPaid { billing_id: Option<AggregateId> },

    #[error("Cart already opened")]
    AlreadyOpened,

    #[error("No line for medication {medication_id}")]
    LineNotFound { medication_id: MedicationId },

    #[error("Quantity for medication {medication_id} must be at least 1")]
    InvalidQuantity { medication_id: MedicationId },

    #[error("Line for medication {medication_id} exceeds the maximum quantity or amount")]
    LineOverflow { medication_id: MedicationId },

    /// The patient already has an open cart registered.
    #[error("Patient already has open cart {cart_id}")]
    OpenCartExists { cart_id: AggregateId },
}

impl CartError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CartError::LineNotFound { .. } => ErrorKind::NotFound,
            CartError::OpenCartExists { .. } => ErrorKind::Conflict,
            CartError::AlreadyPaid { .. }
            | CartError::AlreadyOpened
            | CartError::InvalidQuantity { .. }
            | CartError::LineOverflow { .. } => ErrorKind::InvalidOperation,
        }
    }
}
