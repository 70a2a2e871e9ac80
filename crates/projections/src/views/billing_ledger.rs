//! Billing ledger: live billings with lookup by order reference and cart.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{Aggregate, Billing, BillingEvent, Money};
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::Projection;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillingEntry {
    pub billing_id: AggregateId,
    pub cart_id: AggregateId,
    pub order_ref: Option<String>,
    pub amount: Money,
    pub payment_method: String,
    pub billed_at: DateTime<Utc>,
}

#[derive(Default)]
struct LedgerState {
    billings: HashMap<AggregateId, BillingEntry>,
}

#[derive(Clone, Default)]
pub struct BillingLedgerView {
    state: Arc<RwLock<LedgerState>>,
}

impl BillingLedgerView {
    pub fn new() -> Self {
        Self::default()
    }

    /// All live billings, oldest first.
    pub async fn list(&self) -> Vec<BillingEntry> {
        let state = self.state.read().await;
        let mut billings: Vec<_> = state.billings.values().cloned().collect();
        billings.sort_by_key(|b| (b.billed_at, b.billing_id));
        billings
    }

    pub async fn get(&self, billing_id: AggregateId) -> Option<BillingEntry> {
        self.state.read().await.billings.get(&billing_id).cloned()
    }

    pub async fn by_order_ref(&self, order_ref: &str) -> Vec<BillingEntry> {
        self.list()
            .await
            .into_iter()
            .filter(|b| b.order_ref.as_deref() == Some(order_ref))
            .collect()
    }

    /// The live billing that references `cart_id`, if any.
    pub async fn for_cart(&self, cart_id: AggregateId) -> Option<BillingEntry> {
        self.state
            .read()
            .await
            .billings
            .values()
            .find(|b| b.cart_id == cart_id)
            .cloned()
    }

    /// Sum of every live billing.
    pub async fn total_billed(&self) -> Money {
        self.state
            .read()
            .await
            .billings
            .values()
            .map(|b| b.amount)
            .sum()
    }
}

#[async_trait]
impl Projection for BillingLedgerView {
    fn name(&self) -> &'static str {
        "BillingLedgerView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut state = self.state.write().await;

        if event.aggregate_type != Billing::aggregate_type() {
            return Ok(());
        }

        let billing_event: BillingEvent = serde_json::from_value(event.payload.clone())?;
        let id = event.aggregate_id;

        match billing_event {
            BillingEvent::BillingCreated(data) => {
                state.billings.insert(
                    id,
                    BillingEntry {
                        billing_id: id,
                        cart_id: data.cart_id,
                        order_ref: data.order_ref,
                        amount: data.amount,
                        payment_method: data.payment_method,
                        billed_at: data.billed_at,
                    },
                );
            }
            BillingEvent::BillingCartReferenceChanged(data) => {
                if let Some(entry) = state.billings.get_mut(&id) {
                    entry.cart_id = data.cart_id;
                }
            }
            BillingEvent::BillingDeleted(_) => {
                state.billings.remove(&id);
            }
        }

        Ok(())
    }


    async fn reset(&self) -> Result<()> {
        *self.state.write().await = LedgerState::default();
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use domain::DomainEvent;
    use domain::billing::{BillingCartReferenceChangedData, BillingCreatedData, BillingDeletedData};
    use event_store::Version;

    fn envelope(id: AggregateId, version: i64, event: &BillingEvent) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(id)
            .aggregate_type("Billing")
            .event_type(event.event_type())
            .version(Version::new(version))
            .payload(event)
            .unwrap()
            .build()
            .unwrap()
    }

    async fn create(view: &BillingLedgerView, order_ref: Option<&str>, cents: i64, day: u32) -> AggregateId {
        let id = AggregateId::new();
        let created = BillingEvent::BillingCreated(BillingCreatedData {
            billing_id: id,
            cart_id: AggregateId::new(),
            order_ref: order_ref.map(str::to_string),
            amount: Money::from_cents(cents),
            payment_method: "card".into(),
            billed_at: Utc.with_ymd_and_hms(2025, 5, day, 10, 0, 0).unwrap(),
        });
        view.handle(&envelope(id, 1, &created)).await.unwrap();
        id
    }

    #[tokio::test]
    async fn lists_oldest_first_and_finds_by_reference() {
        let view = BillingLedgerView::new();
        let second = create(&view, Some("ORD-2"), 500, 9).await;
        let first = create(&view, Some("ORD-1"), 1000, 2).await;
        create(&view, None, 250, 4).await;

        let ids: Vec<_> = view.list().await.into_iter().map(|b| b.billing_id).collect();
        assert_eq!(ids.first(), Some(&first));
        assert_eq!(ids.last(), Some(&second));

        let found = view.by_order_ref("ORD-2").await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].billing_id, second);
        assert!(view.by_order_ref("ORD-404").await.is_empty());
        assert_eq!(view.total_billed().await, Money::from_cents(1750));
    }

    #[tokio::test]
    async fn follows_cart_changes_and_deletion() {
        let view = BillingLedgerView::new();
        let id = create(&view, None, 700, 1).await;
        let new_cart = AggregateId::new();

        let changed = BillingEvent::BillingCartReferenceChanged(BillingCartReferenceChangedData {
            previous_cart_id: None,
            cart_id: new_cart,
            changed_at: Utc::now(),
        });
        view.handle(&envelope(id, 2, &changed)).await.unwrap();
        assert_eq!(view.for_cart(new_cart).await.map(|b| b.billing_id), Some(id));

        let deleted = BillingEvent::BillingDeleted(BillingDeletedData {
            cart_id: Some(new_cart),
            deleted_at: Utc::now(),
        });
        view.handle(&envelope(id, 3, &deleted)).await.unwrap();
        assert!(view.get(id).await.is_none());
        assert!(view.for_cart(new_cart).await.is_none());
    }
}
