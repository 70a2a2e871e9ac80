//! Cart service: lazily opened per-patient carts and line editing.

use std::sync::Arc;

use common::{AggregateId, Clock};
use event_store::{EventStore, Version};

use crate::aggregate::Aggregate;
use crate::catalog::MedicationCatalog;
use crate::command::{CommandHandler, CommandResult, UnitOfWork};
use crate::error::DomainError;
use crate::value_objects::{CartLine, LineRequest, MedicationId, PatientId};

use super::{Cart, PatientCartRegistry, registry_id};

/// Attempts at winning the open-cart race before giving up.
const OPEN_CART_ATTEMPTS: usize = 3;

/// Service for managing carts.
pub struct CartService<S: EventStore + Clone> {
    carts: CommandHandler<S, Cart>,
    registries: CommandHandler<S, PatientCartRegistry>,
    catalog: Arc<dyn MedicationCatalog>,
    clock: Arc<dyn Clock>,
}

impl<S: EventStore + Clone> CartService<S> {
    pub fn new(store: S, catalog: Arc<dyn MedicationCatalog>, clock: Arc<dyn Clock>) -> Self {
        Self {
            carts: CommandHandler::new(store.clone()),
            registries: CommandHandler::new(store),
            catalog,
            clock,
        }
    }

    /// Returns the patient's unpaid cart, opening one if there is none.
    ///
    /// The registry claim and `CartOpened` are committed together. A creator
    /// that loses the race re-reads the registry and returns the winner's cart.
    #[tracing::instrument(skip(self))]
    pub async fn get_or_create_open_cart(&self, patient_id: PatientId) -> Result<Cart, DomainError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_open_cart(patient_id).await {
                Err(e) if e.is_conflict() && attempt < OPEN_CART_ATTEMPTS => {
                    tracing::debug!(%patient_id, attempt, "open cart race lost, retrying");
                }
                other => return other,
            }
        }
    }

    async fn try_open_cart(&self, patient_id: PatientId) -> Result<Cart, DomainError> {
        let registry = self.registries.load(registry_id(patient_id)).await?;

        if let Some(cart_id) = registry.open_cart()
            && let Some(cart) = self.carts.load_existing(cart_id).await?
            && !cart.is_paid()
        {
            return Ok(cart);
        }

        let now = self.clock.now();
        let cart_id = AggregateId::new();
        let mut cart = Cart::default();
        let cart_events = cart.open(cart_id, patient_id, now)?;
        let registry_events = registry.replace(patient_id, cart_id, now)?;

        let mut work = UnitOfWork::new();
        work.stage::<PatientCartRegistry>(
            registry_id(patient_id),
            registry.version(),
            &registry_events,
        )?
        .stage::<Cart>(cart_id, Version::initial(), &cart_events)?;
        work.commit(self.carts.store()).await?;

        cart.apply_events(cart_events);
        cart.set_version(Version::first());
        tracing::info!(%patient_id, %cart_id, "cart opened");
        Ok(cart)
    }

    /// Adds lines priced from the catalog. Nothing is written unless every
    /// medication resolves.
    #[tracing::instrument(skip(self))]
    pub async fn add_lines(
        &self,
        cart_id: AggregateId,
        lines: Vec<LineRequest>,
    ) -> Result<CommandResult<Cart>, DomainError> {
        let lines = self.price_lines(lines).await?;
        self.carts
            .execute_existing(cart_id, |cart| cart.add_lines(lines))
            .await
    }

    /// Replaces every line of the cart.
    #[tracing::instrument(skip(self))]
    pub async fn replace_lines(
        &self,
        cart_id: AggregateId,
        lines: Vec<LineRequest>,
    ) -> Result<CommandResult<Cart>, DomainError> {
        let lines = self.price_lines(lines).await?;
        self.carts
            .execute_existing(cart_id, |cart| cart.replace_lines(lines))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_line(
        &self,
        cart_id: AggregateId,
        medication_id: MedicationId,
    ) -> Result<CommandResult<Cart>, DomainError> {
        self.carts
            .execute_existing(cart_id, |cart| cart.remove_line(medication_id))
            .await
    }

    /// Sets the quantity of an existing line; zero removes it.
    #[tracing::instrument(skip(self))]
    pub async fn update_line_quantity(
        &self,
        cart_id: AggregateId,
        medication_id: MedicationId,
        quantity: u32,
    ) -> Result<CommandResult<Cart>, DomainError> {
        self.carts
            .execute_existing(cart_id, |cart| {
                cart.update_line_quantity(medication_id, quantity)
            })
            .await
    }

    /// Deletes the cart, paid or not, and frees the patient's open-cart slot.
    #[tracing::instrument(skip(self))]
    pub async fn delete_cart(&self, cart_id: AggregateId) -> Result<(), DomainError> {
        let cart = self.carts.get(cart_id).await?;
        let now = self.clock.now();

        if cart.is_paid() {
            tracing::warn!(
                %cart_id,
                billing_id = ?cart.billing_id(),
                "deleting a paid cart, its billing keeps a dangling reference"
            );
        }

        let registry_stream = registry_id(cart.patient_id());
        let registry = self.registries.load(registry_stream).await?;

        let mut work = UnitOfWork::new();
        work.stage::<Cart>(cart_id, cart.version(), &cart.delete(now)?)?
            .stage::<PatientCartRegistry>(
                registry_stream,
                registry.version(),
                &registry.release(cart_id, now)?,
            )?;
        work.commit(self.carts.store()).await?;

        tracing::info!(%cart_id, "cart deleted");
        Ok(())
    }

    /// Loads a cart; `NotFound` if it never existed or was deleted.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, cart_id: AggregateId) -> Result<Cart, DomainError> {
        self.carts.get(cart_id).await
    }

    async fn price_lines(&self, requests: Vec<LineRequest>) -> Result<Vec<CartLine>, DomainError> {
        let mut lines = Vec::with_capacity(requests.len());
        for request in requests {
            let medication = self
                .catalog
                .find(request.medication_id)
                .await
                .ok_or_else(|| DomainError::not_found("Medication", request.medication_id))?;
            lines.push(CartLine::new(
                medication.id,
                request.quantity,
                medication.unit_price,
            ));
        }
        Ok(lines)
    }
}
