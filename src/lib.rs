//! Storefront order and payment service
//!
//! Turns shopping carts into orders and confirms their payment with external gateways.
//!
//! ## Features
//! - Active product listing over the catalog
//! - Per-user carts with stock-aware quantity limits
//! - Checkout with cash on delivery, Stripe and Razorpay
//! - Payment confirmation from webhooks and verified client callbacks
//! - Forward-only fulfilment workflow for admins

pub mod api;
pub mod config;
pub mod domain;
pub mod gateway;
pub mod publisher;
pub mod services;
pub mod store;

use thiserror::Error;
use uuid::Uuid;

use domain::aggregates::{CartError, OrderError, OrderStatus, ProductError};
use domain::value_objects::MoneyError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("{0}")]
    Validation(String),

    #[error("Unsupported payment method '{0}'")]
    InvalidPaymentMethod(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Insufficient stock for {name}: requested {requested}, available {available}")]
    InsufficientStock { product_id: Uuid, name: String, requested: u32, available: u32 },

    #[error("Product {0} is out of stock")]
    OutOfStock(Uuid),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Cannot move order from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Not allowed")]
    Forbidden,

    #[error("{0} was modified concurrently, retry the request")]
    Conflict(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, StorefrontError>;

impl From<CartError> for StorefrontError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::OutOfStock(id) => Self::OutOfStock(id),
            CartError::ItemNotFound => Self::NotFound("Cart item".into()),
        }
    }
}

impl From<OrderError> for StorefrontError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::NoItems => Self::EmptyCart,
            OrderError::Money(e) => e.into(),
            OrderError::InvalidTransition { from, to } => Self::InvalidStatusTransition { from, to },
        }
    }
}

impl From<MoneyError> for StorefrontError {
    fn from(e: MoneyError) -> Self {
        match e {
            MoneyError::CurrencyMismatch => Self::Validation("Cart mixes products priced in different currencies".into()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<ProductError> for StorefrontError {
    fn from(e: ProductError) -> Self { Self::Validation(e.to_string()) }
}
