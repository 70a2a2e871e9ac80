//! Payment-intent provider trait and in-memory implementation.
//!
//! The provider is opaque: the engine only asks it for an intent covering a
//! cart total and hands the result back to the caller.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::Money;
use serde::Serialize;

use crate::error::PaymentError;

/// A payment intent issued by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentIntent {
    pub intent_id: String,

    /// Secret the client uses to complete the payment with the provider.
    pub client_secret: String,

    pub cart_id: AggregateId,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait PaymentIntentService: Send + Sync {
    async fn create_intent(
        &self,
        cart_id: AggregateId,
        amount: Money,
    ) -> Result<PaymentIntent, PaymentError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    intents: HashMap<String, PaymentIntent>,
    next_id: u32,
    fail_on_create: bool,
}

/// In-memory payment-intent provider for testing and the demo server.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentIntentService {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentIntentService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to decline intent creation.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_create = fail;
    }

    pub fn intent_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .intents
            .len()
    }

    pub fn get(&self, intent_id: &str) -> Option<PaymentIntent> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .intents
            .get(intent_id)
            .cloned()
    }
}

#[async_trait]
impl PaymentIntentService for InMemoryPaymentIntentService {
    async fn create_intent(
        &self,
        cart_id: AggregateId,
        amount: Money,
    ) -> Result<PaymentIntent, PaymentError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_create {
            return Err(PaymentError::Declined("provider rejected the request".to_string()));
        }

        state.next_id += 1;
        let intent_id = format!("pi_{:06}", state.next_id);
        let intent = PaymentIntent {
            client_secret: format!("{intent_id}_secret_{}", cart_id.as_uuid().simple()),
            intent_id: intent_id.clone(),
            cart_id,
            amount,
            created_at: Utc::now(),
        };
        state.intents.insert(intent_id, intent.clone());

        Ok(intent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn intents_are_numbered_and_kept() {
        let service = InMemoryPaymentIntentService::new();
        let cart_id = AggregateId::new();

        let first = service
            .create_intent(cart_id, Money::from_cents(1000))
            .await
            .unwrap();
        let second = service
            .create_intent(cart_id, Money::from_cents(1000))
            .await
            .unwrap();

        assert_eq!(first.intent_id, "pi_000001");
        assert_eq!(second.intent_id, "pi_000002");
        assert!(first.client_secret.starts_with("pi_000001_secret_"));
        assert_eq!(service.get("pi_000002"), Some(second));
        assert_eq!(service.intent_count(), 2);
    }

    #[tokio::test]
    async fn declined_intent_is_not_stored() {
        let service = InMemoryPaymentIntentService::new();
        service.set_fail_on_create(true);

        let result = service
            .create_intent(AggregateId::new(), Money::from_cents(1))
            .await;
        assert!(matches!(result, Err(PaymentError::Declined(_))));
        assert_eq!(service.intent_count(), 0);
    }
}
