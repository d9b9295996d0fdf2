//! In-process store. Every operation runs under one lock, which makes each
//! trait method atomic with respect to the others.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{demand, CartStore, CatalogStore, Finalization, LedgerStats, OrderLedger, OrderLookup, Page, Paginated, ProductFilter};
use crate::domain::aggregates::{Cart, Order, OrderStatus, PaymentStatus, Product};
use crate::{Result, StorefrontError};

#[derive(Default)]
struct State {
    products: HashMap<Uuid, Product>,
    carts: HashMap<Uuid, Cart>,
    orders: HashMap<Uuid, Order>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Inserts or replaces a catalog entry.
    pub async fn upsert_product(&self, product: Product) {
        self.state.lock().await.products.insert(product.id(), product);
    }
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (chrono::DateTime<chrono::Utc>, Uuid)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

fn paginate<T>(items: Vec<T>, page: Page) -> Paginated<T> {
    let total = items.len() as i64;
    let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let data = items.into_iter().skip(skip).take(page.per_page as usize).collect();
    Paginated::new(data, total, page)
}

fn stored(order: &Order) -> Order {
    let mut copy = order.clone();
    copy.events.clear();
    copy
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn products(&self, ids: &[Uuid]) -> Result<Vec<Product>> {
        let state = self.state.lock().await;
        Ok(ids.iter().filter_map(|id| state.products.get(id).cloned()).collect())
    }

    async fn find_active_products(&self, filter: &ProductFilter, page: Page) -> Result<Paginated<Product>> {
        let state = self.state.lock().await;
        let mut matching: Vec<Product> = state.products.values()
            .filter(|p| p.is_active() && filter.matches(p))
            .cloned()
            .collect();
        newest_first(&mut matching, |p| (p.created_at, p.id));
        Ok(paginate(matching, page))
    }

    async fn decrement_stock(&self, product_id: Uuid, quantity: u32) -> Result<()> {
        let mut state = self.state.lock().await;
        let product = state.products.get_mut(&product_id).ok_or_else(|| StorefrontError::NotFound(format!("Product {product_id}")))?;
        let available = product.stock();
        product.remove_stock(quantity).map_err(|_| StorefrontError::InsufficientStock {
            product_id, name: product.name().to_string(), requested: quantity, available,
        })
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn cart(&self, user_id: Uuid) -> Result<Cart> {
        Ok(self.state.lock().await.carts.get(&user_id).cloned().unwrap_or_else(|| Cart::new(user_id)))
    }

    async fn save_cart(&self, cart: &mut Cart) -> Result<()> {
        let mut state = self.state.lock().await;
        let current = state.carts.get(&cart.user_id).map_or(0, |c| c.revision);
        if current != cart.revision { return Err(StorefrontError::Conflict("Cart".into())); }
        cart.revision += 1;
        state.carts.insert(cart.user_id, cart.clone());
        Ok(())
    }
}

#[async_trait]
impl OrderLedger for MemoryStore {
    async fn order(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn find_order(&self, lookup: &OrderLookup) -> Result<Option<Order>> {
        let state = self.state.lock().await;
        Ok(state.orders.values().find(|o| match lookup {
            OrderLookup::StripePaymentIntent(id) => o.stripe_payment_intent_id() == Some(id.as_str()),
            OrderLookup::RazorpayOrder(id) => o.razorpay_order_id() == Some(id.as_str()),
        }).cloned())
    }

    async fn orders_for_user(&self, user_id: Uuid, page: Page) -> Result<Paginated<Order>> {
        let state = self.state.lock().await;
        let mut mine: Vec<Order> = state.orders.values().filter(|o| o.user_id == user_id).cloned().collect();
        newest_first(&mut mine, |o| (o.created_at, o.id));
        Ok(paginate(mine, page))
    }

    async fn all_orders(&self, status: Option<OrderStatus>, page: Page) -> Result<Paginated<Order>> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state.orders.values()
            .filter(|o| status.map_or(true, |s| o.order_status == s))
            .cloned()
            .collect();
        newest_first(&mut orders, |o| (o.created_at, o.id));
        Ok(paginate(orders, page))
    }

    async fn insert_order(&self, order: &Order) -> Result<()> {
        self.state.lock().await.orders.insert(order.id, stored(order));
        Ok(())
    }

    async fn commit_cash_order(&self, order: &Order, cart_revision: i64) -> Result<()> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let current = state.carts.get(&order.user_id).map_or(0, |c| c.revision);
        if current != cart_revision { return Err(StorefrontError::Conflict("Cart".into())); }
        let needed = demand(order.items());
        for (product_id, (quantity, name)) in &needed {
            let available = state.products.get(product_id).map_or(0, Product::stock);
            if available < *quantity {
                return Err(StorefrontError::InsufficientStock {
                    product_id: *product_id, name: name.to_string(), requested: *quantity, available,
                });
            }
        }
        for (product_id, (quantity, _)) in &needed {
            if let Some(product) = state.products.get_mut(product_id) {
                product.remove_stock(*quantity)?;
            }
        }
        state.orders.insert(order.id, stored(order));
        if let Some(cart) = state.carts.get_mut(&order.user_id) {
            cart.clear();
            cart.revision += 1;
        }
        Ok(())
    }

    async fn finalize_payment(&self, order_id: Uuid, payment_id: &str) -> Result<Finalization> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let mut order = state.orders.get(&order_id).cloned().ok_or_else(|| StorefrontError::NotFound(format!("Order {order_id}")))?;
        if !order.mark_paid(payment_id) { return Ok(Finalization::AlreadyPaid(order)); }
        if order.order_status == OrderStatus::Cancelled {
            state.orders.insert(order_id, stored(&order));
            return Ok(Finalization::PaidAfterCancel(order));
        }

        let mut oversold = vec![];
        for (product_id, (quantity, _)) in demand(order.items()) {
            let Some(product) = state.products.get_mut(&product_id) else { continue };
            if product.remove_stock(quantity).is_err() {
                product.deplete();
                oversold.push(product_id);
            }
        }
        if let Some(cart) = state.carts.get_mut(&order.user_id) {
            cart.clear();
            cart.revision += 1;
        }
        state.orders.insert(order_id, stored(&order));
        Ok(Finalization::Applied { order, oversold })
    }

    async fn mark_payment_failed(&self, order_id: Uuid) -> Result<Option<Order>> {
        let mut state = self.state.lock().await;
        let order = state.orders.get_mut(&order_id).ok_or_else(|| StorefrontError::NotFound(format!("Order {order_id}")))?;
        let mut updated = order.clone();
        if !updated.mark_payment_failed() { return Ok(None); }
        *order = stored(&updated);
        Ok(Some(updated))
    }

    async fn transition_order(&self, order_id: Uuid, next: OrderStatus) -> Result<Order> {
        let mut state = self.state.lock().await;
        let order = state.orders.get_mut(&order_id).ok_or_else(|| StorefrontError::NotFound(format!("Order {order_id}")))?;
        let mut updated = order.clone();
        updated.transition_to(next)?;
        *order = stored(&updated);
        Ok(updated)
    }

    async fn stats(&self) -> Result<LedgerStats> {
        let state = self.state.lock().await;
        let revenue = state.orders.values()
            .filter(|o| o.payment_status == PaymentStatus::Paid)
            .map(|o| o.total_amount.amount())
            .sum::<Decimal>();
        let users: HashSet<Uuid> = state.carts.keys().copied()
            .chain(state.orders.values().map(|o| o.user_id))
            .collect();
        Ok(LedgerStats {
            total_orders: state.orders.len() as i64,
            revenue,
            total_users: users.len() as i64,
            total_products: state.products.len() as i64,
        })
    }
}
