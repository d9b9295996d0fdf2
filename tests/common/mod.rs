//! Shared fixtures: a memory-backed service wired to fake gateways.
#![allow(dead_code)]

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use jsonwebtoken::{encode, EncodingKey, Header};
use rust_decimal::Decimal;
use sha2::Sha256;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use storefront_orders::api::{AppState, Claims, Role, TokenVerifier};
use storefront_orders::config::{RazorpaySettings, StripeSettings};
use storefront_orders::domain::aggregates::Product;
use storefront_orders::domain::value_objects::{Money, ShippingAddress};
use storefront_orders::gateway::{razorpay, CardGateway, GatewayOrder, PaymentIntent, RegionalGateway};
use storefront_orders::publisher::EventPublisher;
use storefront_orders::services::{CartService, Checkout, PaymentWebhooks};
use storefront_orders::store::MemoryStore;
use storefront_orders::{Result, StorefrontError};

pub const JWT_SECRET: &str = "test-secret-that-is-long-enough-for-hs256";
pub const STRIPE_WEBHOOK_SECRET: &str = "whsec_test";
pub const RAZORPAY_KEY_SECRET: &str = "rzp_secret";
pub const RAZORPAY_WEBHOOK_SECRET: &str = "rzp_whsec";

/// Records payment intents and answers retrieval with a configurable status.
pub struct FakeCard {
    pub down: AtomicBool,
    pub intent_status: Mutex<String>,
    pub created: Mutex<Vec<(i64, String, BTreeMap<String, String>)>>,
}

impl Default for FakeCard {
    fn default() -> Self {
        Self { down: AtomicBool::new(false), intent_status: Mutex::new("succeeded".into()), created: Mutex::new(vec![]) }
    }
}

#[async_trait]
impl CardGateway for FakeCard {
    async fn create_payment_intent(&self, amount: i64, currency: &str, metadata: &BTreeMap<String, String>) -> Result<PaymentIntent> {
        if self.down.load(Ordering::SeqCst) { return Err(StorefrontError::Gateway("card gateway down".into())); }
        let mut created = self.created.lock().unwrap();
        created.push((amount, currency.to_string(), metadata.clone()));
        let id = format!("pi_{}", created.len());
        Ok(PaymentIntent { client_secret: format!("{id}_secret_abc"), id, status: "requires_payment_method".into() })
    }

    async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent> {
        Ok(PaymentIntent { id: intent_id.into(), client_secret: String::new(), status: self.intent_status.lock().unwrap().clone() })
    }
}

#[derive(Default)]
pub struct FakeRegional {
    pub down: AtomicBool,
    pub created: Mutex<Vec<(i64, String, String)>>,
}

#[async_trait]
impl RegionalGateway for FakeRegional {
    async fn create_order(&self, amount: i64, currency: &str, receipt: &str) -> Result<GatewayOrder> {
        if self.down.load(Ordering::SeqCst) { return Err(StorefrontError::Gateway("regional gateway down".into())); }
        let mut created = self.created.lock().unwrap();
        created.push((amount, currency.to_string(), receipt.to_string()));
        Ok(GatewayOrder { id: format!("order_{}", created.len()), amount, currency: currency.to_string() })
    }

    fn key_id(&self) -> &str { "rzp_test_key" }

    fn verify_payment_signature(&self, gateway_order_id: &str, payment_id: &str, signature: &str) -> bool {
        razorpay::verify_payment_signature(gateway_order_id, payment_id, signature, RAZORPAY_KEY_SECRET)
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub card: Arc<FakeCard>,
    pub regional: Arc<FakeRegional>,
    pub checkout: Checkout,
    pub carts: CartService,
    pub webhooks: PaymentWebhooks,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let card = Arc::new(FakeCard::default());
        let regional = Arc::new(FakeRegional::default());
        let checkout = Checkout::new(store.clone(), card.clone(), regional.clone(), EventPublisher::disabled());
        let webhooks = PaymentWebhooks::new(checkout.clone(), &stripe_settings(), &razorpay_settings());
        let carts = CartService::new(store.clone(), "INR");
        Self { store, card, regional, checkout, carts, webhooks }
    }

    pub fn state(&self) -> AppState {
        AppState {
            store: self.store.clone(),
            checkout: self.checkout.clone(),
            carts: self.carts.clone(),
            webhooks: self.webhooks.clone(),
            tokens: Arc::new(TokenVerifier::new(JWT_SECRET)),
        }
    }

    /// An active product priced in whole rupees.
    pub async fn product(&self, name: &str, price: i64, stock: u32) -> Product {
        let mut product = Product::create(name, "general", Money::new(Decimal::new(price, 0), "INR"));
        product.add_stock(stock);
        product.publish().unwrap();
        self.store.upsert_product(product.clone()).await;
        product
    }

    pub async fn stock_of(&self, product: &Product) -> u32 {
        use storefront_orders::store::CatalogStore;
        self.store.product(product.id()).await.unwrap().unwrap().stock()
    }

    /// Puts `quantity` units of `product` in the user's cart.
    pub async fn fill_cart(&self, user_id: Uuid, product: &Product, quantity: i64) {
        self.carts.add_item(user_id, product.id()).await.unwrap();
        if quantity != 1 {
            self.carts.set_quantity(user_id, product.id(), quantity).await.unwrap();
        }
    }
}

pub fn stripe_settings() -> StripeSettings {
    StripeSettings {
        secret_key: "sk_test".into(),
        webhook_secret: STRIPE_WEBHOOK_SECRET.into(),
        api_base: "http://localhost".into(),
        webhook_tolerance_secs: 300,
    }
}

pub fn razorpay_settings() -> RazorpaySettings {
    RazorpaySettings {
        key_id: "rzp_test_key".into(),
        key_secret: RAZORPAY_KEY_SECRET.into(),
        webhook_secret: RAZORPAY_WEBHOOK_SECRET.into(),
        api_base: "http://localhost".into(),
    }
}

pub fn address() -> ShippingAddress {
    ShippingAddress {
        street: "12 MG Road".into(),
        city: "Bengaluru".into(),
        state: "KA".into(),
        zip_code: "560001".into(),
        country: "IN".into(),
        phone: "+91 80 1234 5678".into(),
    }
}

pub fn hmac_hex(secret: &str, message: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// A `Stripe-Signature` header for `body` signed now.
pub fn stripe_signature(body: &str) -> String {
    let t = chrono::Utc::now().timestamp();
    let signed = format!("{t}.{body}");
    format!("t={t},v1={}", hmac_hex(STRIPE_WEBHOOK_SECRET, signed.as_bytes()))
}

pub fn razorpay_signature(body: &str) -> String {
    hmac_hex(RAZORPAY_WEBHOOK_SECRET, body.as_bytes())
}

pub fn stripe_succeeded(intent_id: &str, order_id: Option<Uuid>) -> String {
    let metadata = order_id.map_or(serde_json::json!({}), |id| serde_json::json!({ "orderId": id.to_string() }));
    serde_json::json!({
        "id": "evt_1",
        "type": "payment_intent.succeeded",
        "data": { "object": { "id": intent_id, "status": "succeeded", "metadata": metadata } }
    }).to_string()
}

pub fn razorpay_event(event: &str, gateway_order_id: &str, payment_id: &str) -> String {
    serde_json::json!({
        "entity": "event",
        "event": event,
        "payload": { "payment": { "entity": { "id": payment_id, "order_id": gateway_order_id, "status": "captured" } } }
    }).to_string()
}

pub fn token(user_id: Uuid, role: Role) -> String {
    let claims = Claims { sub: user_id, role, exp: (chrono::Utc::now().timestamp() + 3600) as usize };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes())).unwrap()
}
