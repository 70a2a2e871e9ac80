//! Read models for the clinic query side.
//!
//! - [`Projection`] folds the event log into a read model
//! - [`ProjectionProcessor`] feeds the log to projections
//! - [`AppointmentCalendarView`] and [`BillingLedgerView`] are the views
//! - [`ReadSide`] wires both views to a store behind query facades

pub mod error;
pub mod processor;
pub mod projection;
pub mod queries;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use queries::{AppointmentQueries, BillingQueries, ReadSide};
pub use views::{AppointmentCalendarView, BillingEntry, BillingLedgerView, CalendarEntry};
