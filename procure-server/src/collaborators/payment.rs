//! Payment collaborator contract
//!
//! The core stores only the opaque intent id and the derived display
//! fields returned here; amounts are passed in minor units.

use super::CollaboratorError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// A payment intent as seen by the core
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    /// Opaque id at the payment provider
    pub id: String,
    pub status: String,
    pub amount_minor: i64,
    pub currency: String,
    pub payment_method_id: Option<String>,
    pub receipt_url: Option<String>,
}

/// Display fields of a payment method
#[derive(Debug, Clone)]
pub struct PaymentMethod {
    pub kind: String,
    pub last4: Option<String>,
    pub brand: Option<String>,
}

/// Payment provider contract
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        metadata: HashMap<String, String>,
    ) -> Result<PaymentIntent, CollaboratorError>;

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, CollaboratorError>;

    async fn retrieve_payment_method(
        &self,
        payment_method_id: &str,
    ) -> Result<PaymentMethod, CollaboratorError>;
}

/// In-process gateway for tests and local runs
///
/// Intents start in `requires_payment` status; tests drive them to
/// succeeded via [`InProcessGateway::settle`].
#[derive(Debug, Default)]
pub struct InProcessGateway {
    counter: AtomicU64,
    intents: Mutex<HashMap<String, PaymentIntent>>,
}

impl InProcessGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an intent as succeeded with the given payment method
    pub fn settle(&self, intent_id: &str, method_id: &str) {
        let mut intents = self.intents.lock();
        if let Some(intent) = intents.get_mut(intent_id) {
            intent.status = "succeeded".into();
            intent.payment_method_id = Some(method_id.to_string());
            intent.receipt_url = Some(format!("https://pay.example/receipts/{}", intent_id));
        }
    }
}

#[async_trait]
impl PaymentGateway for InProcessGateway {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        _metadata: HashMap<String, String>,
    ) -> Result<PaymentIntent, CollaboratorError> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let intent = PaymentIntent {
            id: format!("pi_{:08}", n),
            status: "requires_payment".into(),
            amount_minor,
            currency: currency.to_string(),
            payment_method_id: None,
            receipt_url: None,
        };
        self.intents.lock().insert(intent.id.clone(), intent.clone());
        Ok(intent)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, CollaboratorError> {
        self.intents
            .lock()
            .get(intent_id)
            .cloned()
            .ok_or_else(|| CollaboratorError::Rejected(format!("unknown intent {}", intent_id)))
    }

    async fn retrieve_payment_method(
        &self,
        payment_method_id: &str,
    ) -> Result<PaymentMethod, CollaboratorError> {
        let last4 = payment_method_id
            .get(payment_method_id.len().saturating_sub(4)..)
            .map(str::to_string);
        Ok(PaymentMethod {
            kind: "card".into(),
            last4,
            brand: Some("visa".into()),
        })
    }
}
