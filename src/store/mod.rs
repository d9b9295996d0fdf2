//! Persistence: the catalog, carts and the order ledger.
//!
//! Every operation that must not interleave with another writer (committing a
//! cash order, finalizing a payment, moving an order through its workflow) is
//! a single trait method, so each backend can make it atomic its own way.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, LineItem, Order, OrderStatus, Product};
use crate::Result;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<String>,
    /// Case-insensitive substring of name or description.
    pub search: Option<String>,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        let category_ok = self.category.as_deref().map_or(true, |c| product.category() == c);
        let search_ok = self.search.as_deref().map_or(true, |s| {
            let needle = s.to_lowercase();
            product.name().to_lowercase().contains(&needle) || product.description().to_lowercase().contains(&needle)
        });
        category_ok && search_ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page { pub page: u32, pub per_page: u32 }

impl Page {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self { page: page.unwrap_or(1).max(1), per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE) }
    }
    /// Rows to skip. Wide enough that no `page` the query string can carry overflows it.
    pub fn offset(&self) -> i64 { (i64::from(self.page) - 1) * i64::from(self.per_page) }
}

impl Default for Page { fn default() -> Self { Self::new(None, None) } }

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> { pub data: Vec<T>, pub total: i64, pub page: u32, pub per_page: u32 }

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, page: Page) -> Self {
        Self { data, total, page: page.page, per_page: page.per_page }
    }
}

/// How a payment confirmation finds its order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderLookup {
    StripePaymentIntent(String),
    RazorpayOrder(String),
}

#[derive(Debug, Clone)]
pub enum Finalization {
    /// The order just became paid. `oversold` lists products whose stock ran
    /// out before this order's units could be taken.
    Applied { order: Order, oversold: Vec<Uuid> },
    /// A previous confirmation already did the work; nothing was touched.
    AlreadyPaid(Order),
    /// The order was cancelled while its payment was pending. The payment is
    /// recorded, but no stock is taken and the cart is left alone.
    PaidAfterCancel(Order),
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LedgerStats {
    pub total_orders: i64,
    /// Sum of paid orders' totals.
    pub revenue: Decimal,
    pub total_users: i64,
    pub total_products: i64,
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn product(&self, id: Uuid) -> Result<Option<Product>>;

    async fn products(&self, ids: &[Uuid]) -> Result<Vec<Product>>;

    /// Active products, newest first. Out-of-stock products are included.
    async fn find_active_products(&self, filter: &ProductFilter, page: Page) -> Result<Paginated<Product>>;

    /// Takes `quantity` units, failing with `InsufficientStock` rather than going negative.
    async fn decrement_stock(&self, product_id: Uuid, quantity: u32) -> Result<()>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// The user's cart; an empty one at revision 0 if none was saved yet.
    async fn cart(&self, user_id: Uuid) -> Result<Cart>;

    /// Saves if nobody else saved since `cart` was loaded, then bumps its revision.
    async fn save_cart(&self, cart: &mut Cart) -> Result<()>;
}

#[async_trait]
pub trait OrderLedger: Send + Sync {
    async fn order(&self, id: Uuid) -> Result<Option<Order>>;

    async fn find_order(&self, lookup: &OrderLookup) -> Result<Option<Order>>;

    async fn orders_for_user(&self, user_id: Uuid, page: Page) -> Result<Paginated<Order>>;

    async fn all_orders(&self, status: Option<OrderStatus>, page: Page) -> Result<Paginated<Order>>;

    /// Records an order whose side effects wait for payment confirmation.
    async fn insert_order(&self, order: &Order) -> Result<()>;

    /// Records an order, takes its stock and clears the owner's cart, all or nothing.
    /// Fails with `Conflict` when the cart moved past `cart_revision`, the
    /// revision the order was frozen from.
    async fn commit_cash_order(&self, order: &Order, cart_revision: i64) -> Result<()>;

    /// Marks the order paid and applies its side effects exactly once.
    async fn finalize_payment(&self, order_id: Uuid, payment_id: &str) -> Result<Finalization>;

    /// `None` when the order exists but its payment is no longer pending.
    async fn mark_payment_failed(&self, order_id: Uuid) -> Result<Option<Order>>;

    async fn transition_order(&self, order_id: Uuid, next: OrderStatus) -> Result<Order>;

    async fn stats(&self) -> Result<LedgerStats>;
}

/// Units needed per product, merged across lines and ordered by product id so
/// that row locks are always taken in the same order.
pub(crate) fn demand(items: &[LineItem]) -> BTreeMap<Uuid, (u32, &str)> {
    let mut needed = BTreeMap::new();
    for item in items {
        let entry = needed.entry(item.product_id).or_insert((0u32, item.name.as_str()));
        entry.0 = entry.0.saturating_add(item.quantity);
    }
    needed
}

pub trait Store: CatalogStore + CartStore + OrderLedger + Send + Sync {}

impl<T: CatalogStore + CartStore + OrderLedger + Send + Sync> Store for T {}
