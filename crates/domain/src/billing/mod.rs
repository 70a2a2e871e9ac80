//! Billing aggregate: the record of a settled cart.

mod aggregate;
mod events;

pub use aggregate::{Billing, NewBilling};
pub use events::{BillingCartReferenceChangedData, BillingCreatedData, BillingDeletedData, BillingEvent};

use thiserror::Error;

use crate::error::ErrorKind;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Billing already created")]
    AlreadyCreated,

    #[error("Payment method must not be empty")]
    EmptyPaymentMethod,
}

impl BillingError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidOperation
    }
}
