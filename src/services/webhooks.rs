//! Payment provider webhooks.
//!
//! A delivery is authenticated first. Once authenticated it is always
//! acknowledged, so a confirmation that cannot be applied is logged here and
//! reported as [`WebhookOutcome::Unapplied`] instead of as an error.

use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::Checkout;
use crate::config::{RazorpaySettings, StripeSettings};
use crate::gateway::{razorpay, stripe};
use crate::store::OrderLookup;
use crate::{Result, StorefrontError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Confirmed(Uuid),
    PaymentFailed(Uuid),
    /// Authenticated, but an event type we do not act on.
    Ignored(String),
    /// Authenticated, but the confirmation could not be applied.
    Unapplied,
}

#[derive(Deserialize)]
struct StripeEvent {
    #[serde(rename = "type")]
    kind: String,
    data: StripeEventData,
}

#[derive(Deserialize)]
struct StripeEventData { object: StripeIntentObject }

#[derive(Deserialize)]
struct StripeIntentObject {
    id: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Deserialize)]
struct RazorpayEvent {
    event: String,
    #[serde(default)]
    payload: Option<RazorpayPayload>,
}

#[derive(Deserialize)]
struct RazorpayPayload { payment: RazorpayPaymentWrapper }

#[derive(Deserialize)]
struct RazorpayPaymentWrapper { entity: RazorpayPayment }

#[derive(Deserialize)]
struct RazorpayPayment {
    id: String,
    order_id: Option<String>,
}

#[derive(Clone)]
pub struct PaymentWebhooks {
    checkout: Checkout,
    stripe_secret: String,
    stripe_tolerance_secs: i64,
    razorpay_secret: String,
}

impl PaymentWebhooks {
    pub fn new(checkout: Checkout, stripe: &StripeSettings, razorpay: &RazorpaySettings) -> Self {
        Self {
            checkout,
            stripe_secret: stripe.webhook_secret.clone(),
            stripe_tolerance_secs: stripe.webhook_tolerance_secs,
            razorpay_secret: razorpay.webhook_secret.clone(),
        }
    }

    pub async fn handle_card(&self, signature: &str, body: &[u8]) -> Result<WebhookOutcome> {
        self.handle_card_at(signature, body, chrono::Utc::now().timestamp()).await
    }

    /// As [`Self::handle_card`], checking the signature timestamp against `now`.
    pub async fn handle_card_at(&self, signature: &str, body: &[u8], now: i64) -> Result<WebhookOutcome> {
        stripe::verify_webhook_signature(signature, body, &self.stripe_secret, self.stripe_tolerance_secs, now)?;
        let event: StripeEvent = serde_json::from_slice(body)
            .map_err(|e| StorefrontError::Validation(format!("Malformed Stripe event: {e}")))?;
        let intent = event.data.object;

        match event.kind.as_str() {
            "payment_intent.succeeded" => {
                let applied = match intent.metadata.get("orderId").and_then(|id| Uuid::parse_str(id).ok()) {
                    Some(order_id) => self.checkout.finalize(order_id, &intent.id).await,
                    None => self.checkout.finalize_by_lookup(&OrderLookup::StripePaymentIntent(intent.id.clone()), &intent.id).await,
                };
                Ok(settle("stripe", applied.map(|o| WebhookOutcome::Confirmed(o.id()))))
            }
            "payment_intent.payment_failed" => {
                let lookup = OrderLookup::StripePaymentIntent(intent.id);
                Ok(settle("stripe", self.fail_by_lookup(&lookup).await))
            }
            other => {
                debug!(event = %other, "ignoring Stripe event");
                Ok(WebhookOutcome::Ignored(other.to_string()))
            }
        }
    }

    pub async fn handle_regional(&self, signature: &str, body: &[u8]) -> Result<WebhookOutcome> {
        razorpay::verify_webhook_signature(body, signature, &self.razorpay_secret)?;
        let event: RazorpayEvent = serde_json::from_slice(body)
            .map_err(|e| StorefrontError::Validation(format!("Malformed Razorpay event: {e}")))?;

        let kind = event.event.as_str();
        if !matches!(kind, "order.paid" | "payment.captured" | "payment.failed") {
            debug!(event = %kind, "ignoring Razorpay event");
            return Ok(WebhookOutcome::Ignored(event.event));
        }
        let Some(payment) = event.payload.map(|p| p.payment.entity) else {
            error!(event = %kind, "Razorpay event without a payment entity");
            return Ok(WebhookOutcome::Unapplied);
        };
        let Some(gateway_order_id) = payment.order_id else {
            error!(event = %kind, payment_id = %payment.id, "Razorpay payment without an order id");
            return Ok(WebhookOutcome::Unapplied);
        };
        let lookup = OrderLookup::RazorpayOrder(gateway_order_id);

        let outcome = if kind == "payment.failed" {
            self.fail_by_lookup(&lookup).await
        } else {
            self.checkout.finalize_by_lookup(&lookup, &payment.id).await.map(|o| WebhookOutcome::Confirmed(o.id()))
        };
        Ok(settle("razorpay", outcome))
    }

    async fn fail_by_lookup(&self, lookup: &OrderLookup) -> Result<WebhookOutcome> {
        let order = self.checkout.store().find_order(lookup).await?
            .ok_or_else(|| StorefrontError::NotFound(format!("Order for {lookup:?}")))?;
        if self.checkout.mark_payment_failed(order.id()).await? {
            Ok(WebhookOutcome::PaymentFailed(order.id()))
        } else {
            Ok(WebhookOutcome::Ignored("payment already settled".into()))
        }
    }
}

fn settle(provider: &str, outcome: Result<WebhookOutcome>) -> WebhookOutcome {
    match outcome {
        Ok(outcome) => {
            info!(%provider, ?outcome, "webhook processed");
            outcome
        }
        Err(e) => {
            error!(%provider, error = %e, "webhook authenticated but could not be applied");
            WebhookOutcome::Unapplied
        }
    }
}
