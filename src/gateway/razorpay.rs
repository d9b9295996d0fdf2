//! Razorpay orders, checkout callback signatures and webhook signatures.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::{error, info, instrument};

use super::{signature, GatewayOrder, RegionalGateway};
use crate::config::RazorpaySettings;
use crate::{Result, StorefrontError};

#[derive(Clone)]
pub struct RazorpayClient {
    http: reqwest::Client,
    key_id: String,
    key_secret: String,
    api_base: String,
}

impl RazorpayClient {
    pub fn new(settings: &RazorpaySettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StorefrontError::Internal(format!("failed to build Razorpay client: {e}")))?;
        Ok(Self {
            http,
            key_id: settings.key_id.clone(),
            key_secret: settings.key_secret.clone(),
            api_base: settings.api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RegionalGateway for RazorpayClient {
    #[instrument(skip(self))]
    async fn create_order(&self, amount: i64, currency: &str, receipt: &str) -> Result<GatewayOrder> {
        let response = self.http
            .post(format!("{}/v1/orders", self.api_base))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&json!({ "amount": amount, "currency": currency.to_uppercase(), "receipt": receipt }))
            .send()
            .await
            .map_err(|e| StorefrontError::Gateway(format!("Razorpay unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Razorpay API error");
            return Err(StorefrontError::Gateway(format!("Razorpay responded with {status}")));
        }
        let order: GatewayOrder = response.json().await
            .map_err(|e| StorefrontError::Gateway(format!("unreadable Razorpay response: {e}")))?;
        info!(gateway_order_id = %order.id, "Razorpay order created");
        Ok(order)
    }

    fn key_id(&self) -> &str { &self.key_id }

    fn verify_payment_signature(&self, gateway_order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_payment_signature(gateway_order_id, payment_id, signature, &self.key_secret)
    }
}

/// Checkout callbacks are signed over `"{order_id}|{payment_id}"` with the key secret.
pub fn verify_payment_signature(gateway_order_id: &str, payment_id: &str, signature: &str, key_secret: &str) -> bool {
    signature::verify_hex(key_secret, format!("{gateway_order_id}|{payment_id}").as_bytes(), signature)
}

/// Webhooks are signed over the raw request body with the webhook secret.
pub fn verify_webhook_signature(body: &[u8], signature: &str, webhook_secret: &str) -> Result<()> {
    if signature::verify_hex(webhook_secret, body, signature) { Ok(()) } else { Err(StorefrontError::InvalidSignature) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    fn sign(secret: &str, message: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_payment_signature() {
        let sig = sign("key_secret", "order_Abc|pay_Xyz");
        assert!(verify_payment_signature("order_Abc", "pay_Xyz", &sig, "key_secret"));
        assert!(!verify_payment_signature("order_Abc", "pay_Other", &sig, "key_secret"));
        assert!(!verify_payment_signature("order_Abc", "pay_Xyz", &sig, "wrong_secret"));
    }

    #[test]
    fn test_webhook_signature() {
        let body = r#"{"event":"order.paid"}"#;
        let sig = sign("whsec", body);
        assert!(verify_webhook_signature(body.as_bytes(), &sig, "whsec").is_ok());
        assert!(matches!(
            verify_webhook_signature(br#"{"event":"order.paid "}"#, &sig, "whsec"),
            Err(StorefrontError::InvalidSignature)
        ));
    }
}
