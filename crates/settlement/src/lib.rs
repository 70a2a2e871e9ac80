//! Settlement of carts into billings.
//!
//! A settlement marks the cart paid, records the billing and frees the
//! patient's open-cart slot in one atomic commit, then draws the purchased
//! quantities from the stock ledger. Stock failures never undo a settlement;
//! they come back as warnings.

pub mod engine;
pub mod error;
pub mod outcome;
pub mod payment;
pub mod stock;

pub use engine::{SettleCart, SettlementEngine};
pub use error::{PaymentError, SettlementError, StockError};
pub use outcome::{Settlement, SettlementWarning};
pub use payment::{InMemoryPaymentIntentService, PaymentIntent, PaymentIntentService};
pub use stock::{InMemoryStockLedger, PostgresStockLedger, StockChange, StockLedger};
