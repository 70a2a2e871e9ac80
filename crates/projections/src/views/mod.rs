//! Read model views.

pub mod billing_ledger;
pub mod calendar;

pub use billing_ledger::{BillingEntry, BillingLedgerView};
pub use calendar::{AppointmentCalendarView, CalendarEntry};
