//! Cart aggregate implementation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use serde::Serialize;

use crate::aggregate::Aggregate;
use crate::value_objects::{CartLine, MedicationId, Money, PatientId};

use super::{CartError, CartEvent, events::LineQuantityUpdatedData};

/// Cart aggregate root.
///
/// The total is maintained incrementally as lines change and always equals
/// the sum of the line totals.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Cart {
    id: Option<AggregateId>,

    #[serde(skip)]
    version: Version,

    patient_id: PatientId,

    /// Lines keyed by medication; a medication appears at most once.
    lines: BTreeMap<MedicationId, CartLine>,

    total: Money,
    paid: bool,
    billing_id: Option<AggregateId>,

    #[serde(skip)]
    deleted: bool,
}

impl Aggregate for Cart {
    type Event = CartEvent;
    type Error = CartError;

    fn aggregate_type() -> &'static str {
        "Cart"
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
            CartEvent::CartOpened(data) => {
                self.id = Some(data.cart_id);
                self.patient_id = data.patient_id;
            }
            CartEvent::LinesAdded(data) => {
                for line in data.lines {
                    self.merge_line(line);
                }
            }
            CartEvent::LinesReplaced(data) => {
                self.lines.clear();
                self.total = Money::zero();
                for line in data.lines {
                    self.merge_line(line);
                }
                self.total = self.lines.values().map(CartLine::total_price).sum();
            }
            CartEvent::LineRemoved(data) => self.apply_line_removed(data.medication_id),
            CartEvent::LineQuantityUpdated(data) => self.apply_quantity_updated(data),
            CartEvent::CartPaid(data) => {
                self.paid = true;
                self.billing_id = Some(data.billing_id);
            }
            CartEvent::CartPaymentReverted(_) => {
                self.paid = false;
                self.billing_id = None;
            }
            CartEvent::CartDeleted(_) => {
                self.deleted = true;
            }
        }
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }
}

// Query methods
impl Cart {
    pub fn patient_id(&self) -> PatientId {
        self.patient_id
    }

    pub fn lines(&self) -> impl Iterator<Item = &CartLine> {
        self.lines.values()
    }

    pub fn line(&self, medication_id: MedicationId) -> Option<&CartLine> {
        self.lines.get(&medication_id)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn is_paid(&self) -> bool {
        self.paid
    }

    /// The billing that paid this cart, if any.
    pub fn billing_id(&self) -> Option<AggregateId> {
        self.billing_id
    }
}

// Command methods (return events)
impl Cart {
    pub fn open(
        &self,
        cart_id: AggregateId,
        patient_id: PatientId,
        now: DateTime<Utc>,
    ) -> Result<Vec<CartEvent>, CartError> {
        if self.id.is_some() {
            return Err(CartError::AlreadyOpened);
        }
        Ok(vec![CartEvent::opened(cart_id, patient_id, now)])
    }

    /// Adds priced lines, merging with lines already present.
    pub fn add_lines(&self, lines: Vec<CartLine>) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_unpaid()?;
        validate_quantities(&lines)?;
        check_bounds(&self.lines, &lines)?;

        if lines.is_empty() {
            return Ok(vec![]);
        }
        Ok(vec![CartEvent::lines_added(lines)])
    }

    pub fn replace_lines(&self, lines: Vec<CartLine>) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_unpaid()?;
        validate_quantities(&lines)?;
        check_bounds(&BTreeMap::new(), &lines)?;

        Ok(vec![CartEvent::lines_replaced(lines)])
    }

    pub fn remove_line(&self, medication_id: MedicationId) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_unpaid()?;

        if !self.lines.contains_key(&medication_id) {
            return Err(CartError::LineNotFound { medication_id });
        }
        Ok(vec![CartEvent::line_removed(medication_id)])
    }

    /// Sets a line's quantity; zero removes the line.
    pub fn update_line_quantity(
        &self,
        medication_id: MedicationId,
        quantity: u32,
    ) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_unpaid()?;

        let existing = self
            .lines
            .get(&medication_id)
            .ok_or(CartError::LineNotFound { medication_id })?;

        if quantity == 0 {
            return Ok(vec![CartEvent::line_removed(medication_id)]);
        }

        let mut updated = self.lines.clone();
        updated.remove(&medication_id);
        check_bounds(
            &updated,
            &[CartLine::new(medication_id, quantity, existing.unit_price)],
        )?;

        if quantity != existing.quantity {
            Ok(vec![CartEvent::line_quantity_updated(
                medication_id,
                existing.quantity,
                quantity,
            )])
        } else {
            Ok(vec![])
        }
    }

    pub fn mark_paid(
        &self,
        billing_id: AggregateId,
        now: DateTime<Utc>,
    ) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_unpaid()?;
        Ok(vec![CartEvent::paid(billing_id, self.total, now)])
    }

    /// Reopens the cart if, and only if, `billing_id` is the billing that paid it.
    pub fn revert_payment(
        &self,
        billing_id: AggregateId,
        now: DateTime<Utc>,
    ) -> Result<Vec<CartEvent>, CartError> {
        if self.paid && self.billing_id == Some(billing_id) {
            Ok(vec![CartEvent::payment_reverted(billing_id, now)])
        } else {
            Ok(vec![])
        }
    }

    /// Tombstones the cart whether or not it was paid.
    pub fn delete(&self, now: DateTime<Utc>) -> Result<Vec<CartEvent>, CartError> {
        Ok(vec![CartEvent::deleted(self.paid, now)])
    }

    fn ensure_unpaid(&self) -> Result<(), CartError> {
        if self.paid {
            return Err(CartError::AlreadyPaid {
                billing_id: self.billing_id,
            });
        }
        Ok(())
    }
}

fn validate_quantities(lines: &[CartLine]) -> Result<(), CartError> {
    match lines.iter().find(|line| line.quantity == 0) {
        Some(line) => Err(CartError::InvalidQuantity {
            medication_id: line.medication_id,
        }),
        None => Ok(()),
    }
}

/// Rejects lines whose merged quantity, line total or cart total would overflow.
fn check_bounds(
    current: &BTreeMap<MedicationId, CartLine>,
    incoming: &[CartLine],
) -> Result<(), CartError> {
    let mut merged = current.clone();
    for line in incoming {
        let overflow = CartError::LineOverflow {
            medication_id: line.medication_id,
        };
        match merged.get_mut(&line.medication_id) {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .checked_add(line.quantity)
                    .ok_or(overflow)?;
            }
            None => {
                merged.insert(line.medication_id, line.clone());
            }
        }
    }

    let mut total = Money::zero();
    for line in merged.values() {
        let overflow = || CartError::LineOverflow {
            medication_id: line.medication_id,
        };
        let line_total = line
            .unit_price
            .checked_multiply(line.quantity)
            .ok_or_else(overflow)?;
        total = total.checked_add(line_total).ok_or_else(overflow)?;
    }
    Ok(())
}

// Apply event helpers
impl Cart {
    fn merge_line(&mut self, line: CartLine) {
        match self.lines.get_mut(&line.medication_id) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(line.quantity);
                self.total += existing.unit_price.multiply(line.quantity);
            }
            None => {
                self.total += line.total_price();
                self.lines.insert(line.medication_id, line);
            }
        }
    }

    fn apply_line_removed(&mut self, medication_id: MedicationId) {
        if let Some(line) = self.lines.remove(&medication_id) {
            self.total = self.total.saturating_sub(line.total_price());
        }
    }

    fn apply_quantity_updated(&mut self, data: LineQuantityUpdatedData) {
        if let Some(line) = self.lines.get_mut(&data.medication_id) {
            self.total = self.total.saturating_sub(line.total_price());
            line.quantity = data.new_quantity;
            self.total += line.total_price();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: i64, quantity: u32, cents: i64) -> CartLine {
        CartLine::new(MedicationId::new(id), quantity, Money::from_cents(cents))
    }

    fn open_cart() -> Cart {
        let mut cart = Cart::default();
        let events = cart
            .open(AggregateId::new(), PatientId::new(16), Utc::now())
            .unwrap();
        cart.apply_events(events);
        cart
    }

    fn with(mut cart: Cart, result: Result<Vec<CartEvent>, CartError>) -> Cart {
        cart.apply_events(result.unwrap());
        cart
    }

    fn sum_of_lines(cart: &Cart) -> Money {
        cart.lines().map(CartLine::total_price).sum()
    }

    #[test]
    fn new_cart_is_empty_and_unpaid() {
        let cart = open_cart();
        assert_eq!(cart.total(), Money::zero());
        assert!(!cart.is_paid());
        assert_eq!(cart.line_count(), 0);
    }

    #[test]
    fn adding_lines_updates_total() {
        let cart = open_cart();
        let result = cart.add_lines(vec![line(1, 2, 500)]);
        let cart = with(cart, result);

        assert_eq!(cart.total(), Money::from_cents(1000));
        assert_eq!(cart.total(), sum_of_lines(&cart));
    }

    #[test]
    fn re_adding_merges_and_keeps_first_price() {
        let cart = open_cart();
        let result = cart.add_lines(vec![line(1, 2, 500)]);
        let cart = with(cart, result);
        let result = cart.add_lines(vec![line(1, 3, 900), line(2, 1, 250)]);
        let cart = with(cart, result);

        let merged = cart.line(MedicationId::new(1)).unwrap();
        assert_eq!(merged.quantity, 5);
        assert_eq!(merged.unit_price, Money::from_cents(500));
        assert_eq!(cart.line_count(), 2);
        assert_eq!(cart.total(), Money::from_cents(2750));
        assert_eq!(cart.total(), sum_of_lines(&cart));
    }

    #[test]
    fn duplicates_in_one_request_merge() {
        let cart = open_cart();
        let result = cart.add_lines(vec![line(4, 1, 100), line(4, 2, 100)]);
        let cart = with(cart, result);

        assert_eq!(cart.line(MedicationId::new(4)).unwrap().quantity, 3);
        assert_eq!(cart.total(), Money::from_cents(300));
    }

    #[test]
    fn replace_recomputes_from_scratch() {
        let cart = open_cart();
        let result = cart.add_lines(vec![line(1, 2, 500), line(2, 1, 250)]);
        let cart = with(cart, result);
        let result = cart.replace_lines(vec![line(3, 4, 125)]);
        let cart = with(cart, result);

        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.total(), Money::from_cents(500));
        assert_eq!(cart.total(), sum_of_lines(&cart));
    }

    #[test]
    fn remove_then_add_restores_total() {
        let cart = open_cart();
        let result = cart.add_lines(vec![line(1, 2, 500), line(2, 1, 250)]);
        let cart = with(cart, result);
        let before = cart.total();

        let result = cart.remove_line(MedicationId::new(2));
        let cart = with(cart, result);
        assert_eq!(cart.total(), Money::from_cents(1000));

        let result = cart.add_lines(vec![line(2, 1, 250)]);
        let cart = with(cart, result);
        assert_eq!(cart.total(), before);
    }

    #[test]
    fn removing_missing_line_fails() {
        let cart = open_cart();
        assert!(matches!(
            cart.remove_line(MedicationId::new(9)),
            Err(CartError::LineNotFound { .. })
        ));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let cart = open_cart();
        assert!(matches!(
            cart.add_lines(vec![line(1, 1, 100), line(2, 0, 100)]),
            Err(CartError::InvalidQuantity { .. })
        ));
        assert!(matches!(
            cart.replace_lines(vec![line(2, 0, 100)]),
            Err(CartError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn update_quantity_adjusts_total_and_zero_removes() {
        let cart = open_cart();
        let result = cart.add_lines(vec![line(1, 2, 500)]);
        let cart = with(cart, result);

        let result = cart.update_line_quantity(MedicationId::new(1), 5);
        let cart = with(cart, result);
        assert_eq!(cart.total(), Money::from_cents(2500));

        assert!(
            cart.update_line_quantity(MedicationId::new(1), 5)
                .unwrap()
                .is_empty()
        );

        let result = cart.update_line_quantity(MedicationId::new(1), 0);
        let cart = with(cart, result);
        assert_eq!(cart.line_count(), 0);
        assert_eq!(cart.total(), Money::zero());
    }

    #[test]
    fn overflowing_quantity_is_rejected_before_any_event() {
        let cart = open_cart();
        let result = cart.add_lines(vec![line(1, u32::MAX, 1)]);
        let cart = with(cart, result);

        assert!(matches!(
            cart.add_lines(vec![line(1, 1, 1)]),
            Err(CartError::LineOverflow { .. })
        ));
        assert!(matches!(
            cart.replace_lines(vec![line(2, u32::MAX, 1), line(2, 1, 1)]),
            Err(CartError::LineOverflow { .. })
        ));
        assert_eq!(cart.line(MedicationId::new(1)).unwrap().quantity, u32::MAX);
        assert_eq!(cart.total(), sum_of_lines(&cart));
    }

    #[test]
    fn overflowing_amount_is_rejected() {
        let cart = open_cart();
        assert!(matches!(
            cart.add_lines(vec![line(1, 3, i64::MAX / 2)]),
            Err(CartError::LineOverflow { .. })
        ));

        let result = cart.add_lines(vec![line(1, 1, i64::MAX / 2), line(2, 1, i64::MAX / 2)]);
        let cart = with(cart, result);
        assert!(matches!(
            cart.add_lines(vec![line(3, 1, i64::MAX / 2)]),
            Err(CartError::LineOverflow { .. })
        ));
        assert!(matches!(
            cart.update_line_quantity(MedicationId::new(1), 2),
            Err(CartError::LineOverflow { .. })
        ));
    }

    #[test]
    fn paid_cart_is_frozen() {
        let cart = open_cart();
        let result = cart.add_lines(vec![line(1, 2, 500)]);
        let cart = with(cart, result);
        let billing_id = AggregateId::new();
        let result = cart.mark_paid(billing_id, Utc::now());
        let cart = with(cart, result);

        assert!(cart.is_paid());
        assert_eq!(cart.billing_id(), Some(billing_id));
        assert!(matches!(
            cart.add_lines(vec![line(2, 1, 1)]),
            Err(CartError::AlreadyPaid { .. })
        ));
        assert!(cart.remove_line(MedicationId::new(1)).is_err());
        assert!(cart.update_line_quantity(MedicationId::new(1), 1).is_err());
        assert!(cart.mark_paid(AggregateId::new(), Utc::now()).is_err());
        assert!(cart.delete(Utc::now()).is_ok());
    }

    #[test]
    fn revert_only_for_the_paying_billing() {
        let cart = open_cart();
        let billing_id = AggregateId::new();
        let result = cart.mark_paid(billing_id, Utc::now());
        let cart = with(cart, result);

        assert!(
            cart.revert_payment(AggregateId::new(), Utc::now())
                .unwrap()
                .is_empty()
        );

        let result = cart.revert_payment(billing_id, Utc::now());
        let cart = with(cart, result);
        assert!(!cart.is_paid());
        assert_eq!(cart.billing_id(), None);
    }
}
