//! Settlement error types.

use common::AggregateId;
use domain::{BillingError, CartError, DomainError, ErrorKind, MedicationId};
use thiserror::Error;

/// Errors from the stock ledger.
#[derive(Debug, Error)]
pub enum StockError {
    #[error("No stock entry for medication {0}")]
    UnknownMedication(MedicationId),

    #[error("Stock ledger unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StockError::UnknownMedication(_) => ErrorKind::NotFound,
            StockError::Unavailable(_) | StockError::Database(_) => ErrorKind::Internal,
        }
    }
}

/// Errors from the payment-intent provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment intent declined: {0}")]
    Declined(String),
}

/// Errors that can occur while settling or reverting.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// The cart was paid already, possibly by a concurrent settlement.
    #[error("Cart {cart_id} is already settled")]
    AlreadySettled {
        cart_id: AggregateId,
        billing_id: Option<AggregateId>,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Stock error: {0}")]
    Stock(#[from] StockError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),
}

impl SettlementError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SettlementError::AlreadySettled { .. } => ErrorKind::AlreadySettled,
            SettlementError::Domain(e) => e.kind(),
            SettlementError::Stock(e) => e.kind(),
            SettlementError::Payment(_) => ErrorKind::Internal,
        }
    }
}

impl From<CartError> for SettlementError {
    fn from(e: CartError) -> Self {
        SettlementError::Domain(e.into())
    }
}

impl From<BillingError> for SettlementError {
    fn from(e: BillingError) -> Self {
        SettlementError::Domain(e.into())
    }
}

/// Convenience type alias for settlement results.
pub type Result<T> = std::result::Result<T, SettlementError>;
