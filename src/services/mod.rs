//! Application services: the workflows the HTTP layer drives.

pub mod cart;
pub mod checkout;
pub mod webhooks;

pub use cart::{CartLine, CartMutation, CartService, CartView, ProductSummary};
pub use checkout::{Checkout, PlaceOrder, PlacedOrder, VerifyPayment};
pub use webhooks::{PaymentWebhooks, WebhookOutcome};
