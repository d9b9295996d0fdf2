//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::{Product, ProductError};
pub use order::{LineItem, Order, OrderError, OrderStatus, PaymentMethod, PaymentStatus, UnknownVariant};
pub use cart::{Cart, CartError, CartItem, CartUpdate};
