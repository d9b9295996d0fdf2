//! Stripe payment intents and webhook signatures.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{error, info, instrument};

use super::{signature, CardGateway, PaymentIntent};
use crate::config::StripeSettings;
use crate::{Result, StorefrontError};

#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl StripeClient {
    pub fn new(settings: &StripeSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StorefrontError::Internal(format!("failed to build Stripe client: {e}")))?;
        Ok(Self { http, secret_key: settings.secret_key.clone(), api_base: settings.api_base.trim_end_matches('/').to_string() })
    }

    async fn parse(response: reqwest::Response) -> Result<PaymentIntent> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Stripe API error");
            return Err(StorefrontError::Gateway(format!("Stripe responded with {status}")));
        }
        response.json().await.map_err(|e| StorefrontError::Gateway(format!("unreadable Stripe response: {e}")))
    }
}

#[async_trait]
impl CardGateway for StripeClient {
    #[instrument(skip(self, metadata))]
    async fn create_payment_intent(&self, amount: i64, currency: &str, metadata: &BTreeMap<String, String>) -> Result<PaymentIntent> {
        let mut form = vec![
            ("amount".to_string(), amount.to_string()),
            ("currency".to_string(), currency.to_lowercase()),
            ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
        ];
        form.extend(metadata.iter().map(|(k, v)| (format!("metadata[{k}]"), v.clone())));

        let response = self.http
            .post(format!("{}/v1/payment_intents", self.api_base))
            .basic_auth(&self.secret_key, Some(""))
            .form(&form)
            .send()
            .await
            .map_err(|e| StorefrontError::Gateway(format!("Stripe unreachable: {e}")))?;
        let intent = Self::parse(response).await?;
        info!(payment_intent_id = %intent.id, "Stripe payment intent created");
        Ok(intent)
    }

    #[instrument(skip(self))]
    async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent> {
        let response = self.http
            .get(format!("{}/v1/payment_intents/{intent_id}", self.api_base))
            .basic_auth(&self.secret_key, Some(""))
            .send()
            .await
            .map_err(|e| StorefrontError::Gateway(format!("Stripe unreachable: {e}")))?;
        Self::parse(response).await
    }
}

/// Verifies a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`) against
/// the raw request body. The timestamp must lie within `tolerance_secs` of `now`.
pub fn verify_webhook_signature(header: &str, payload: &[u8], secret: &str, tolerance_secs: i64, now: i64) -> Result<()> {
    let mut timestamp = None;
    let mut candidates = vec![];
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or(StorefrontError::InvalidSignature)?;
    if (now - timestamp).abs() > tolerance_secs { return Err(StorefrontError::InvalidSignature); }

    let mut signed = format!("{timestamp}.").into_bytes();
    signed.extend_from_slice(payload);
    if candidates.iter().any(|sig| signature::verify_hex(secret, &signed, sig)) { Ok(()) } else { Err(StorefrontError::InvalidSignature) }
}
