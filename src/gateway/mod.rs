//! Payment gateway clients.
//!
//! Two providers are wired in: Stripe as the card-network gateway (payment
//! intents, confirmed client-side with a client secret) and Razorpay as the
//! regional gateway (gateway orders, confirmed with a signed callback).

pub mod razorpay;
pub mod signature;
pub mod stripe;

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::Result;

pub use razorpay::RazorpayClient;
pub use stripe::StripeClient;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    #[serde(default)]
    pub client_secret: String,
    pub status: String,
}

impl PaymentIntent {
    pub fn is_succeeded(&self) -> bool { self.status == "succeeded" }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

#[async_trait]
pub trait CardGateway: Send + Sync {
    /// `amount` is in the currency's minor unit.
    async fn create_payment_intent(&self, amount: i64, currency: &str, metadata: &BTreeMap<String, String>) -> Result<PaymentIntent>;

    async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent>;
}

#[async_trait]
pub trait RegionalGateway: Send + Sync {
    /// `amount` is in the currency's minor unit.
    async fn create_order(&self, amount: i64, currency: &str, receipt: &str) -> Result<GatewayOrder>;

    /// Public key handed to the checkout widget.
    fn key_id(&self) -> &str;

    /// Checks the signature the checkout widget returns after a successful payment.
    fn verify_payment_signature(&self, gateway_order_id: &str, payment_id: &str, signature: &str) -> bool;
}
