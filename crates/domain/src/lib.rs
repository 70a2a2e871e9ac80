//! Domain layer for the clinic backend.
//!
//! This crate provides:
//! - Aggregate and DomainEvent traits for event-sourced entities
//! - CommandHandler and UnitOfWork for single and multi-stream writes
//! - Appointment aggregate with the patient/doctor confirmation handshake
//! - Cart aggregate with the per-patient open-cart registry
//! - Billing aggregate produced by settlement

pub mod aggregate;
pub mod appointment;
pub mod billing;
pub mod cart;
pub mod catalog;
pub mod command;
pub mod directory;
pub mod error;
pub mod value_objects;

pub use aggregate::{Aggregate, DomainEvent};
pub use appointment::{
    Appointment, AppointmentError, AppointmentEvent, AppointmentService, AppointmentStatus,
    BookAppointment, CancelAppointment, ConfirmAppointment, PurgePolicy, PurgeSettings,
    RescheduleAppointment, Role, UpdateNote,
};
pub use billing::{Billing, BillingError, BillingEvent, NewBilling};
pub use cart::{Cart, CartError, CartEvent, CartService, PatientCartEvent, PatientCartRegistry};
pub use catalog::{InMemoryCatalog, Medication, MedicationCatalog};
pub use command::{CommandHandler, CommandResult, UnitOfWork};
pub use directory::{ClinicDirectory, InMemoryDirectory};
pub use error::{DomainError, ErrorKind};
pub use value_objects::{CartLine, DoctorId, LineRequest, MedicationId, Money, PatientId};
