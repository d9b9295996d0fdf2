//! Turns a cart into an order and confirms payment for it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::aggregates::{Cart, LineItem, Order, OrderStatus, PaymentMethod, Product};
use crate::domain::events::{DomainEvent, InventoryEvent};
use crate::domain::value_objects::ShippingAddress;
use crate::gateway::{CardGateway, RegionalGateway};
use crate::publisher::EventPublisher;
use crate::store::{Finalization, OrderLookup, Store};
use crate::{Result, StorefrontError};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrder {
    #[serde(default)]
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
}

/// What the client needs to finish checkout.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PlacedOrder {
    /// Cash on delivery: the order is already committed.
    Cash(Order),
    #[serde(rename_all = "camelCase")]
    Card { client_secret: String, order_id: Uuid },
    #[serde(rename_all = "camelCase")]
    Regional { gateway_order_id: String, order_id: Uuid, amount: i64, currency: String, key: String },
}

impl PlacedOrder {
    pub fn order_id(&self) -> Uuid {
        match self {
            Self::Cash(order) => order.id(),
            Self::Card { order_id, .. } | Self::Regional { order_id, .. } => *order_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPayment {
    pub order_id: Uuid,
    pub payment_id: String,
    #[serde(default)]
    pub signature: String,
}

#[derive(Clone)]
pub struct Checkout {
    store: Arc<dyn Store>,
    card: Arc<dyn CardGateway>,
    regional: Arc<dyn RegionalGateway>,
    events: EventPublisher,
}

impl Checkout {
    pub fn new(store: Arc<dyn Store>, card: Arc<dyn CardGateway>, regional: Arc<dyn RegionalGateway>, events: EventPublisher) -> Self {
        Self { store, card, regional, events }
    }

    pub fn store(&self) -> &dyn Store { self.store.as_ref() }

    #[instrument(skip(self, request), fields(payment_method = %request.payment_method))]
    pub async fn place_order(&self, user_id: Uuid, request: PlaceOrder) -> Result<PlacedOrder> {
        let missing = request.shipping_address.missing_fields();
        if !missing.is_empty() {
            return Err(StorefrontError::Validation(format!("Missing shipping address fields: {}", missing.join(", "))));
        }
        let method: PaymentMethod = request.payment_method.parse()
            .map_err(|_| StorefrontError::InvalidPaymentMethod(request.payment_method.clone()))?;

        let cart = self.store.cart(user_id).await?;
        if cart.is_empty() { return Err(StorefrontError::EmptyCart); }
        let items = self.freeze(&cart).await?;
        let mut order = Order::place(user_id, items, request.shipping_address, method)?;

        let placed = match method {
            PaymentMethod::Cod => {
                self.store.commit_cash_order(&order, cart.revision()).await?;
                PlacedOrder::Cash(order.clone())
            }
            PaymentMethod::Stripe => {
                let amount = order.total_amount().to_minor_units()?;
                let metadata = BTreeMap::from([
                    ("orderId".to_string(), order.id().to_string()),
                    ("userId".to_string(), user_id.to_string()),
                ]);
                let intent = self.card.create_payment_intent(amount, order.total_amount().currency(), &metadata).await?;
                order.attach_payment_intent(&intent.id);
                self.store.insert_order(&order).await?;
                PlacedOrder::Card { client_secret: intent.client_secret, order_id: order.id() }
            }
            PaymentMethod::Razorpay => {
                let amount = order.total_amount().to_minor_units()?;
                let receipt = order.id().to_string();
                let gateway_order = self.regional.create_order(amount, order.total_amount().currency(), &receipt).await?;
                order.attach_gateway_order(&gateway_order.id);
                self.store.insert_order(&order).await?;
                PlacedOrder::Regional {
                    gateway_order_id: gateway_order.id,
                    order_id: order.id(),
                    amount: gateway_order.amount,
                    currency: gateway_order.currency,
                    key: self.regional.key_id().to_string(),
                }
            }
        };

        info!(order_id = %order.id(), %user_id, total = %order.total_amount(), "order placed");
        self.events.publish(order.take_events()).await;
        Ok(placed)
    }

    /// Confirms a payment the client reports, after checking it with the provider.
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn verify_payment(&self, user_id: Uuid, request: VerifyPayment) -> Result<Order> {
        let order = self.store.order(request.order_id).await?
            .filter(|o| o.user_id() == user_id)
            .ok_or_else(|| StorefrontError::NotFound(format!("Order {}", request.order_id)))?;

        match order.payment_method() {
            PaymentMethod::Cod => {
                return Err(StorefrontError::Validation("Cash on delivery orders have no payment to verify".into()));
            }
            PaymentMethod::Razorpay => {
                let gateway_order_id = order.razorpay_order_id()
                    .ok_or_else(|| StorefrontError::Internal(format!("order {} has no gateway order", order.id())))?;
                if !self.regional.verify_payment_signature(gateway_order_id, &request.payment_id, &request.signature) {
                    warn!(order_id = %order.id(), "payment signature rejected");
                    return Err(StorefrontError::InvalidSignature);
                }
            }
            PaymentMethod::Stripe => {
                let intent_id = order.stripe_payment_intent_id()
                    .ok_or_else(|| StorefrontError::Internal(format!("order {} has no payment intent", order.id())))?;
                if request.payment_id != intent_id {
                    return Err(StorefrontError::Validation("Payment does not belong to this order".into()));
                }
                let intent = self.card.retrieve_payment_intent(intent_id).await?;
                if !intent.is_succeeded() {
                    return Err(StorefrontError::Validation(format!("Payment is not complete (status {})", intent.status)));
                }
            }
        }
        self.finalize(order.id(), &request.payment_id).await
    }

    /// Marks an order paid and applies its side effects. Repeating it is harmless.
    #[instrument(skip(self))]
    pub async fn finalize(&self, order_id: Uuid, payment_id: &str) -> Result<Order> {
        match self.store.finalize_payment(order_id, payment_id).await? {
            Finalization::AlreadyPaid(order) => {
                info!(%order_id, "payment already recorded, nothing to do");
                Ok(order)
            }
            Finalization::PaidAfterCancel(mut order) => {
                warn!(%order_id, %payment_id, "payment received for a cancelled order, refund it manually; stock and cart left untouched");
                self.events.publish(order.take_events()).await;
                Ok(order)
            }
            Finalization::Applied { mut order, oversold } => {
                let mut events = order.take_events();
                for product_id in oversold {
                    warn!(%order_id, %product_id, "stock exhausted before paid order was fulfilled, clamped at zero");
                    events.push(DomainEvent::Inventory(InventoryEvent::Oversold { product_id, order_id }));
                }
                info!(%order_id, %payment_id, "payment confirmed");
                self.events.publish(events).await;
                Ok(order)
            }
        }
    }

    /// Finalizes the order a provider correlation id points at.
    pub async fn finalize_by_lookup(&self, lookup: &OrderLookup, payment_id: &str) -> Result<Order> {
        let order = self.store.find_order(lookup).await?
            .ok_or_else(|| StorefrontError::NotFound(format!("Order for {lookup:?}")))?;
        self.finalize(order.id(), payment_id).await
    }

    /// `false` when the payment had already settled and nothing changed.
    pub async fn mark_payment_failed(&self, order_id: Uuid) -> Result<bool> {
        match self.store.mark_payment_failed(order_id).await? {
            Some(mut order) => {
                info!(%order_id, "payment failed");
                self.events.publish(order.take_events()).await;
                Ok(true)
            }
            None => {
                info!(%order_id, "payment failure ignored, payment no longer pending");
                Ok(false)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn update_status(&self, order_id: Uuid, next: OrderStatus) -> Result<Order> {
        let mut order = self.store.transition_order(order_id, next).await?;
        info!(%order_id, status = %next, "order status updated");
        self.events.publish(order.take_events()).await;
        Ok(order)
    }

    /// Snapshots every cart line against the current catalog. Nothing is
    /// written when any line fails.
    async fn freeze(&self, cart: &Cart) -> Result<Vec<LineItem>> {
        let ids: Vec<Uuid> = cart.items().iter().map(|i| i.product_id).collect();
        let products: HashMap<Uuid, Product> = self.store.products(&ids).await?
            .into_iter()
            .map(|p| (p.id(), p))
            .collect();

        cart.items().iter().map(|item| {
            let product = products.get(&item.product_id)
                .filter(|p| p.is_active())
                .ok_or_else(|| StorefrontError::NotFound(format!("Product {}", item.product_id)))?;
            if item.quantity > product.stock() {
                return Err(StorefrontError::InsufficientStock {
                    product_id: product.id(), name: product.name().to_string(),
                    requested: item.quantity, available: product.stock(),
                });
            }
            Ok(LineItem::snapshot(product, item.quantity))
        }).collect()
    }
}

