use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use serde::Serialize;

use crate::aggregate::Aggregate;
use crate::value_objects::Money;

use super::{
    BillingCartReferenceChangedData, BillingCreatedData, BillingDeletedData, BillingError,
    BillingEvent,
};

/// Everything needed to record a billing.
#[derive(Debug, Clone)]
pub struct NewBilling {
    pub billing_id: AggregateId,
    pub cart_id: AggregateId,
    pub order_ref: Option<String>,
    pub amount: Money,
    pub payment_method: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Billing {
    id: Option<AggregateId>,

    #[serde(skip)]
    version: Version,

    cart_id: Option<AggregateId>,
    order_ref: Option<String>,
    amount: Money,
    payment_method: String,
    billed_at: Option<DateTime<Utc>>,

    #[serde(skip)]
    deleted: bool,
}

impl Aggregate for Billing {
    type Event = BillingEvent;
    type Error = BillingError;

    fn aggregate_type() -> &'static str {
        "Billing"
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
            BillingEvent::BillingCreated(data) => {
                self.id = Some(data.billing_id);
                self.cart_id = Some(data.cart_id);
                self.order_ref = data.order_ref;
                self.amount = data.amount;
                self.payment_method = data.payment_method;
                self.billed_at = Some(data.billed_at);
            }
            BillingEvent::BillingCartReferenceChanged(data) => {
                self.cart_id = Some(data.cart_id);
            }
            BillingEvent::BillingDeleted(_) => {
                self.deleted = true;
            }
        }
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }
}

impl Billing {
    pub fn cart_id(&self) -> Option<AggregateId> {
        self.cart_id
    }

    pub fn order_ref(&self) -> Option<&str> {
        self.order_ref.as_deref()
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn payment_method(&self) -> &str {
        &self.payment_method
    }

    pub fn billed_at(&self) -> Option<DateTime<Utc>> {
        self.billed_at
    }

    pub fn create(
        &self,
        billing: NewBilling,
        now: DateTime<Utc>,
    ) -> Result<Vec<BillingEvent>, BillingError> {
        if self.id.is_some() {
            return Err(BillingError::AlreadyCreated);
        }
        if billing.payment_method.trim().is_empty() {
            return Err(BillingError::EmptyPaymentMethod);
        }

        Ok(vec![BillingEvent::BillingCreated(BillingCreatedData {
            billing_id: billing.billing_id,
            cart_id: billing.cart_id,
            order_ref: billing.order_ref,
            amount: billing.amount,
            payment_method: billing.payment_method,
            billed_at: now,
        })])
    }

    /// Points the billing at another cart; no event when unchanged.
    pub fn change_cart_reference(
        &self,
        cart_id: AggregateId,
        now: DateTime<Utc>,
    ) -> Result<Vec<BillingEvent>, BillingError> {
        if self.cart_id == Some(cart_id) {
            return Ok(vec![]);
        }
        Ok(vec![BillingEvent::BillingCartReferenceChanged(
            BillingCartReferenceChangedData {
                previous_cart_id: self.cart_id,
                cart_id,
                changed_at: now,
            },
        )])
    }

    pub fn delete(&self, now: DateTime<Utc>) -> Result<Vec<BillingEvent>, BillingError> {
        Ok(vec![BillingEvent::BillingDeleted(BillingDeletedData {
            cart_id: self.cart_id,
            deleted_at: now,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_billing(payment_method: &str) -> NewBilling {
        NewBilling {
            billing_id: AggregateId::new(),
            cart_id: AggregateId::new(),
            order_ref: Some("ORD-1".into()),
            amount: Money::from_cents(4200),
            payment_method: payment_method.into(),
        }
    }

    #[test]
    fn create_records_everything() {
        let mut billing = Billing::default();
        let request = new_billing("card");
        let events = billing.create(request.clone(), Utc::now()).unwrap();
        billing.apply_events(events);

        assert_eq!(billing.id(), Some(request.billing_id));
        assert_eq!(billing.cart_id(), Some(request.cart_id));
        assert_eq!(billing.order_ref(), Some("ORD-1"));
        assert_eq!(billing.amount(), Money::from_cents(4200));
        assert!(billing.create(new_billing("card"), Utc::now()).is_err());
    }

    #[test]
    fn blank_payment_method_is_rejected() {
        assert!(matches!(
            Billing::default().create(new_billing("  "), Utc::now()),
            Err(BillingError::EmptyPaymentMethod)
        ));
    }

    #[test]
    fn unchanged_cart_reference_is_a_no_op() {
        let mut billing = Billing::default();
        let request = new_billing("cash");
        let events = billing.create(request.clone(), Utc::now()).unwrap();
        billing.apply_events(events);

        assert!(
            billing
                .change_cart_reference(request.cart_id, Utc::now())
                .unwrap()
                .is_empty()
        );

        let other = AggregateId::new();
        let events = billing.change_cart_reference(other, Utc::now()).unwrap();
        billing.apply_events(events);
        assert_eq!(billing.cart_id(), Some(other));
    }
}
