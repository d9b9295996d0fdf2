//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use crate::domain::aggregates::Product;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{Money, MoneyError, ShippingAddress};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub(crate) id: Uuid,
    pub(crate) user_id: Uuid,
    pub(crate) items: Vec<LineItem>,
    pub(crate) total_amount: Money,
    pub(crate) shipping_address: ShippingAddress,
    pub(crate) payment_method: PaymentMethod,
    pub(crate) payment_status: PaymentStatus,
    pub(crate) order_status: OrderStatus,
    pub(crate) stripe_payment_intent_id: Option<String>,
    pub(crate) razorpay_order_id: Option<String>,
    pub(crate) provider_payment_id: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

/// A product as it was when the order was placed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem { pub product_id: Uuid, pub name: String, pub quantity: u32, pub price: Money, pub image: Option<String> }

impl LineItem {
    pub fn snapshot(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id(), name: product.name().to_string(), quantity,
            price: product.price().clone(), image: product.primary_image().map(str::to_string),
        }
    }
    pub fn line_total(&self) -> Money { self.price.multiply(self.quantity) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod { Cod, Stripe, Razorpay }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus { #[default] Pending, Paid, Failed }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus { #[default] Processing, Shipped, Delivered, Cancelled }

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Cod => "cod", Self::Stripe => "stripe", Self::Razorpay => "razorpay" }
    }
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Pending => "pending", Self::Paid => "paid", Self::Failed => "failed" }
    }
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing", Self::Shipped => "shipped",
            Self::Delivered => "delivered", Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool { matches!(self, Self::Delivered | Self::Cancelled) }

    /// Forward-only fulfilment workflow.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (Self::Processing, Self::Shipped) | (Self::Shipped, Self::Delivered) | (Self::Processing, Self::Cancelled)
        )
    }
}

macro_rules! display_and_parse {
    ($ty:ident { $($text:literal => $variant:ident),+ $(,)? }) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
        }
        impl FromStr for $ty {
            type Err = UnknownVariant;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(UnknownVariant(s.to_string())),
                }
            }
        }
    };
}

display_and_parse!(PaymentMethod { "cod" => Cod, "stripe" => Stripe, "razorpay" => Razorpay });
display_and_parse!(PaymentStatus { "pending" => Pending, "paid" => Paid, "failed" => Failed });
display_and_parse!(OrderStatus {
    "processing" => Processing, "shipped" => Shipped, "delivered" => Delivered, "cancelled" => Cancelled,
});

#[derive(Debug, Clone, PartialEq, Eq)] pub struct UnknownVariant(pub String);
impl std::error::Error for UnknownVariant {}
impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Unknown value '{}'", self.0) }
}

impl Order {
    /// Freezes `items` into a new order. The total is computed here and never again.
    pub fn place(user_id: Uuid, items: Vec<LineItem>, shipping_address: ShippingAddress, payment_method: PaymentMethod) -> Result<Self, OrderError> {
        let first = items.first().ok_or(OrderError::NoItems)?;
        let total_amount = items.iter().try_fold(Money::zero(first.price.currency()), |acc, i| acc.add(&i.line_total()))?;
        let now = Utc::now();
        let mut order = Self {
            id: Uuid::now_v7(), user_id, items, total_amount, shipping_address, payment_method,
            payment_status: PaymentStatus::Pending, order_status: OrderStatus::Processing,
            stripe_payment_intent_id: None, razorpay_order_id: None, provider_payment_id: None,
            created_at: now, updated_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: order.id, user_id, total: order.total_amount.amount(), payment_method,
        }));
        Ok(order)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn total_amount(&self) -> &Money { &self.total_amount }
    pub fn shipping_address(&self) -> &ShippingAddress { &self.shipping_address }
    pub fn payment_method(&self) -> PaymentMethod { self.payment_method }
    pub fn payment_status(&self) -> PaymentStatus { self.payment_status }
    pub fn order_status(&self) -> OrderStatus { self.order_status }
    pub fn stripe_payment_intent_id(&self) -> Option<&str> { self.stripe_payment_intent_id.as_deref() }
    pub fn razorpay_order_id(&self) -> Option<&str> { self.razorpay_order_id.as_deref() }
    pub fn provider_payment_id(&self) -> Option<&str> { self.provider_payment_id.as_deref() }
    pub fn is_paid(&self) -> bool { self.payment_status == PaymentStatus::Paid }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    pub fn attach_payment_intent(&mut self, intent_id: impl Into<String>) { self.stripe_payment_intent_id = Some(intent_id.into()); self.touch(); }
    pub fn attach_gateway_order(&mut self, gateway_order_id: impl Into<String>) { self.razorpay_order_id = Some(gateway_order_id.into()); self.touch(); }

    /// Records a confirmed payment. Returns `false` when the order was already paid,
    /// in which case nothing changes.
    pub fn mark_paid(&mut self, payment_id: impl Into<String>) -> bool {
        if self.is_paid() { return false; }
        let payment_id = payment_id.into();
        self.payment_status = PaymentStatus::Paid;
        self.provider_payment_id = Some(payment_id.clone());
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::Paid { order_id: self.id, payment_id }));
        true
    }

    /// Only a pending payment can fail; a paid order stays paid.
    pub fn mark_payment_failed(&mut self) -> bool {
        if self.payment_status != PaymentStatus::Pending { return false; }
        self.payment_status = PaymentStatus::Failed;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::PaymentFailed { order_id: self.id }));
        true
    }

    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        let from = self.order_status;
        if !from.can_transition_to(next) { return Err(OrderError::InvalidTransition { from, to: next }); }
        self.order_status = next;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, from, to: next }));
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum OrderError { NoItems, Money(MoneyError), InvalidTransition { from: OrderStatus, to: OrderStatus } }
impl std::error::Error for OrderError {}
impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoItems => write!(f, "No items"),
            Self::Money(e) => write!(f, "{e}"),
            Self::InvalidTransition { from, to } => write!(f, "Cannot move order from {from} to {to}"),
        }
    }
}
impl From<MoneyError> for OrderError { fn from(e: MoneyError) -> Self { Self::Money(e) } }
