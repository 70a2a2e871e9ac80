//! The settlement engine.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use common::{AggregateId, Clock};
use domain::cart::registry_id;
use domain::{
    Aggregate, Billing, Cart, CommandHandler, Money, NewBilling, PatientCartRegistry, PatientId,
    UnitOfWork,
};
use event_store::{EventStore, Version};

use crate::error::{Result, SettlementError};
use crate::outcome::{Settlement, SettlementWarning};
use crate::payment::{PaymentIntent, PaymentIntentService};
use crate::stock::StockLedger;

/// Commit attempts before a conflict is handed back to the caller.
const COMMIT_ATTEMPTS: usize = 3;

/// Request to settle a cart.
#[derive(Debug, Clone)]
pub struct SettleCart {
    pub cart_id: AggregateId,
    pub payment_method: String,
    pub order_ref: Option<String>,

    /// Amount the caller believes it is paying; the cart total is charged regardless.
    pub amount: Option<Money>,
}

impl SettleCart {
    pub fn new(cart_id: AggregateId, payment_method: impl Into<String>) -> Self {
        Self {
            cart_id,
            payment_method: payment_method.into(),
            order_ref: None,
            amount: None,
        }
    }

    pub fn with_order_ref(mut self, order_ref: impl Into<String>) -> Self {
        self.order_ref = Some(order_ref.into());
        self
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }
}

/// Turns carts into billings, exactly once per cart.
pub struct SettlementEngine<S: EventStore + Clone> {
    store: S,
    carts: CommandHandler<S, Cart>,
    billings: CommandHandler<S, Billing>,
    registries: CommandHandler<S, PatientCartRegistry>,
    stock: Arc<dyn StockLedger>,
    payments: Arc<dyn PaymentIntentService>,
    clock: Arc<dyn Clock>,
}

impl<S: EventStore + Clone> SettlementEngine<S> {
    pub fn new(
        store: S,
        stock: Arc<dyn StockLedger>,
        payments: Arc<dyn PaymentIntentService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            carts: CommandHandler::new(store.clone()),
            billings: CommandHandler::new(store.clone()),
            registries: CommandHandler::new(store.clone()),
            store,
            stock,
            payments,
            clock,
        }
    }

    pub fn stock(&self) -> &Arc<dyn StockLedger> {
        &self.stock
    }

    /// Settles a cart.
    ///
    /// `CartPaid`, `BillingCreated` and the release of the patient's open-cart
    /// slot are committed together. Stock is drawn afterwards; anything that
    /// goes wrong there is returned as a warning.
    #[tracing::instrument(skip(self), fields(cart_id = %cmd.cart_id))]
    pub async fn settle(&self, cmd: SettleCart) -> Result<Settlement> {
        let started = Instant::now();

        let (cart, billing) = match self.commit_settlement(&cmd).await {
            Ok(settled) => settled,
            Err(e) => {
                if let SettlementError::AlreadySettled { billing_id, .. } = &e {
                    metrics::counter!("settlements_rejected_total").increment(1);
                    tracing::info!(?billing_id, "cart already settled");
                }
                return Err(e);
            }
        };

        let mut warnings = Vec::new();

        if let Some(requested) = cmd.amount
            && requested != billing.amount()
        {
            warnings.push(SettlementWarning::AmountMismatch {
                requested,
                charged: billing.amount(),
            });
        }

        for line in cart.lines() {
            match self.stock.decrement(line.medication_id, line.quantity).await {
                Ok(change) if change.clamped => {
                    warnings.push(SettlementWarning::StockClamped {
                        medication_id: line.medication_id,
                        requested: line.quantity,
                        available: change.previous,
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    metrics::counter!("stock_decrement_failures_total").increment(1);
                    warnings.push(SettlementWarning::StockDecrementFailed {
                        medication_id: line.medication_id,
                        quantity: line.quantity,
                        reason: e.to_string(),
                    });
                }
            }
        }

        for warning in &warnings {
            tracing::warn!(%warning, "settlement warning");
        }

        metrics::counter!("settlements_total").increment(1);
        metrics::histogram!("settlement_duration_seconds").record(started.elapsed().as_secs_f64());
        tracing::info!(
            billing_id = ?billing.id(),
            amount = %billing.amount(),
            warnings = warnings.len(),
            "cart settled"
        );

        Ok(Settlement { billing, warnings })
    }

    async fn commit_settlement(&self, cmd: &SettleCart) -> Result<(Cart, Billing)> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut cart = self.carts.get(cmd.cart_id).await?;
            if cart.is_paid() {
                return Err(SettlementError::AlreadySettled {
                    cart_id: cmd.cart_id,
                    billing_id: cart.billing_id(),
                });
            }

            let now = self.clock.now();
            let billing_id = AggregateId::new();
            let cart_events = cart.mark_paid(billing_id, now)?;

            let mut billing = Billing::default();
            let billing_events = billing.create(
                NewBilling {
                    billing_id,
                    cart_id: cmd.cart_id,
                    order_ref: cmd.order_ref.clone(),
                    amount: cart.total(),
                    payment_method: cmd.payment_method.clone(),
                },
                now,
            )?;

            let registry_stream = registry_id(cart.patient_id());
            let registry = self.registries.load(registry_stream).await?;
            let registry_events = registry.release(cmd.cart_id, now)?;

            let mut work = UnitOfWork::new();
            work.stage::<Cart>(cmd.cart_id, cart.version(), &cart_events)?
                .stage::<Billing>(billing_id, Version::initial(), &billing_events)?
                .stage::<PatientCartRegistry>(
                    registry_stream,
                    registry.version(),
                    &registry_events,
                )?;

            match work.commit(&self.store).await {
                Ok(()) => {
                    let version = cart.version().next();
                    cart.apply_events(cart_events);
                    cart.set_version(version);
                    billing.apply_events(billing_events);
                    billing.set_version(Version::first());
                    return Ok((cart, billing));
                }
                Err(e) if e.is_conflict() && attempt < COMMIT_ATTEMPTS => {
                    tracing::debug!(attempt, "settlement raced another writer, re-reading cart");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Deletes a billing and reopens the cart it paid for.
    ///
    /// The cart becomes the patient's open cart again unless the patient has
    /// opened another one since. Stock is not restored.
    #[tracing::instrument(skip(self))]
    pub async fn revert_settlement(&self, billing_id: AggregateId) -> Result<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let billing = self.billings.get(billing_id).await?;
            let now = self.clock.now();

            let mut work = UnitOfWork::new();
            work.stage::<Billing>(billing_id, billing.version(), &billing.delete(now)?)?;

            let mut reopened = None;
            if let Some(cart_id) = billing.cart_id()
                && let Some(cart) = self.carts.load_existing(cart_id).await?
            {
                let cart_events = cart.revert_payment(billing_id, now)?;
                if !cart_events.is_empty() {
                    work.stage::<Cart>(cart_id, cart.version(), &cart_events)?;
                    let registry = self.registries.load(registry_id(cart.patient_id())).await?;
                    let registry_events = self
                        .reopen_events(&registry, cart.patient_id(), cart_id, now)
                        .await?;
                    work.stage::<PatientCartRegistry>(
                        registry_id(cart.patient_id()),
                        registry.version(),
                        &registry_events,
                    )?;
                    reopened = Some(cart_id);
                }
            }

            match work.commit(&self.store).await {
                Ok(()) => {
                    tracing::info!(%billing_id, reopened_cart = ?reopened, "settlement reverted");
                    return Ok(());
                }
                Err(e) if e.is_conflict() && attempt < COMMIT_ATTEMPTS => {
                    tracing::debug!(attempt, "revert raced another writer, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Moves a billing onto another cart.
    ///
    /// The new cart becomes paid by this billing and the old one is reopened.
    /// Everything is checked before anything is written.
    #[tracing::instrument(skip(self))]
    pub async fn change_cart_reference(
        &self,
        billing_id: AggregateId,
        new_cart_id: AggregateId,
    ) -> Result<Billing> {
        let mut billing = self.billings.get(billing_id).await?;
        if billing.cart_id() == Some(new_cart_id) {
            return Ok(billing);
        }

        let new_cart = self.carts.get(new_cart_id).await?;
        if new_cart.is_paid() {
            return Err(SettlementError::AlreadySettled {
                cart_id: new_cart_id,
                billing_id: new_cart.billing_id(),
            });
        }

        let now = self.clock.now();
        let billing_events = billing.change_cart_reference(new_cart_id, now)?;

        let mut work = UnitOfWork::new();
        work.stage::<Billing>(billing_id, billing.version(), &billing_events)?
            .stage::<Cart>(
                new_cart_id,
                new_cart.version(),
                &new_cart.mark_paid(billing_id, now)?,
            )?;

        // The new cart leaves its patient's open-cart slot.
        let new_patient = new_cart.patient_id();
        let mut registry = self.registries.load(registry_id(new_patient)).await?;
        let registry_version = registry.version();
        let mut registry_events = registry.release(new_cart_id, now)?;
        registry.apply_events(registry_events.clone());

        let old_cart = match billing.cart_id() {
            Some(old_cart_id) => self.carts.load_existing(old_cart_id).await?,
            None => None,
        };

        if let Some(old_cart) = old_cart
            && let Some(old_cart_id) = old_cart.id()
        {
            let cart_events = old_cart.revert_payment(billing_id, now)?;
            if !cart_events.is_empty() {
                work.stage::<Cart>(old_cart_id, old_cart.version(), &cart_events)?;

                let old_patient = old_cart.patient_id();
                if old_patient == new_patient {
                    registry_events.extend(
                        self.reopen_events(&registry, old_patient, old_cart_id, now)
                            .await?,
                    );
                } else {
                    let other = self.registries.load(registry_id(old_patient)).await?;
                    let other_events = self
                        .reopen_events(&other, old_patient, old_cart_id, now)
                        .await?;
                    work.stage::<PatientCartRegistry>(
                        registry_id(old_patient),
                        other.version(),
                        &other_events,
                    )?;
                }
            }
        }

        work.stage::<PatientCartRegistry>(
            registry_id(new_patient),
            registry_version,
            &registry_events,
        )?;
        work.commit(&self.store).await?;

        let version = billing.version().next();
        billing.apply_events(billing_events);
        billing.set_version(version);

        tracing::info!(%billing_id, %new_cart_id, "billing moved to another cart");
        Ok(billing)
    }

    /// Asks the payment provider for an intent covering the cart total.
    #[tracing::instrument(skip(self))]
    pub async fn prepare_payment(&self, cart_id: AggregateId) -> Result<PaymentIntent> {
        let cart = self.carts.get(cart_id).await?;
        if cart.is_paid() {
            return Err(SettlementError::AlreadySettled {
                cart_id,
                billing_id: cart.billing_id(),
            });
        }

        let intent = self.payments.create_intent(cart_id, cart.total()).await?;
        tracing::info!(%cart_id, intent_id = %intent.intent_id, amount = %intent.amount, "payment intent created");
        Ok(intent)
    }

    /// Loads a billing; `NotFound` if it never existed or was deleted.
    pub async fn get_billing(&self, billing_id: AggregateId) -> Result<Billing> {
        Ok(self.billings.get(billing_id).await?)
    }

    // Registers `cart_id` as the patient's open cart unless a live, unpaid
    // cart already holds the slot.
    async fn reopen_events(
        &self,
        registry: &PatientCartRegistry,
        patient_id: PatientId,
        cart_id: AggregateId,
        now: DateTime<Utc>,
    ) -> Result<Vec<domain::PatientCartEvent>> {
        if let Some(current) = registry.open_cart()
            && let Some(cart) = self.carts.load_existing(current).await?
            && !cart.is_paid()
        {
            return Ok(vec![]);
        }
        Ok(registry.replace(patient_id, cart_id, now)?)
    }
}
