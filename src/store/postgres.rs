//! PostgreSQL store. Multi-row operations run in one transaction; stock is only
//! ever taken with a conditional `UPDATE ... WHERE stock >= $n`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgConnection, PgPool};
use sqlx::types::Json;
use tracing::warn;
use uuid::Uuid;

use super::{demand, CartStore, CatalogStore, Finalization, LedgerStats, OrderLedger, OrderLookup, Page, Paginated, ProductFilter};
use crate::domain::aggregates::{Cart, CartItem, LineItem, Order, OrderStatus, Product};
use crate::domain::value_objects::{Money, Quantity, ShippingAddress};
use crate::{Result, StorefrontError};

const PRODUCT_COLUMNS: &str = "id, name, description, category, price, currency, stock, images, active, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, user_id, items, total_amount, currency, shipping_address, payment_method, payment_status, \
    order_status, stripe_payment_intent_id, razorpay_order_id, provider_payment_id, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid, name: String, description: String, category: String, price: Decimal, currency: String,
    stock: i32, images: Vec<String>, active: bool, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Self {
            id: r.id, name: r.name, description: r.description, category: r.category,
            price: Money::new(r.price, &r.currency), stock: Quantity::new(u32::try_from(r.stock).unwrap_or(0)),
            images: r.images, active: r.active, created_at: r.created_at, updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CartRow { user_id: Uuid, items: Json<Vec<CartItem>>, revision: i64, updated_at: DateTime<Utc> }

impl From<CartRow> for Cart {
    fn from(r: CartRow) -> Self {
        Self { user_id: r.user_id, items: r.items.0, revision: r.revision, updated_at: r.updated_at }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid, user_id: Uuid, items: Json<Vec<LineItem>>, total_amount: Decimal, currency: String,
    shipping_address: Json<ShippingAddress>, payment_method: String, payment_status: String, order_status: String,
    stripe_payment_intent_id: Option<String>, razorpay_order_id: Option<String>, provider_payment_id: Option<String>,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StorefrontError;

    fn try_from(r: OrderRow) -> Result<Self> {
        let corrupt = |e: crate::domain::aggregates::UnknownVariant| StorefrontError::Internal(format!("order {}: {e}", r.id));
        Ok(Self {
            payment_method: r.payment_method.parse().map_err(corrupt)?,
            payment_status: r.payment_status.parse().map_err(corrupt)?,
            order_status: r.order_status.parse().map_err(corrupt)?,
            id: r.id, user_id: r.user_id, items: r.items.0, total_amount: Money::new(r.total_amount, &r.currency),
            shipping_address: r.shipping_address.0, stripe_payment_intent_id: r.stripe_payment_intent_id,
            razorpay_order_id: r.razorpay_order_id, provider_payment_id: r.provider_payment_id,
            created_at: r.created_at, updated_at: r.updated_at, events: vec![],
        })
    }
}

fn like_pattern(search: &str) -> String {
    let escaped = search.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

fn quantity_param(quantity: u32) -> i32 { i32::try_from(quantity).unwrap_or(i32::MAX) }

async fn take_stock(conn: &mut PgConnection, product_id: Uuid, quantity: u32) -> Result<bool> {
    let done = sqlx::query("UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1 AND stock >= $2")
        .bind(product_id).bind(quantity_param(quantity))
        .execute(&mut *conn).await?;
    Ok(done.rows_affected() == 1)
}

async fn shortfall(conn: &mut PgConnection, product_id: Uuid, name: &str, quantity: u32) -> Result<StorefrontError> {
    let available: Option<i32> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
        .bind(product_id).fetch_optional(&mut *conn).await?;
    Ok(StorefrontError::InsufficientStock {
        product_id, name: name.to_string(), requested: quantity,
        available: available.and_then(|s| u32::try_from(s).ok()).unwrap_or(0),
    })
}

async fn clear_cart(conn: &mut PgConnection, user_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE carts SET items = '[]'::jsonb, revision = revision + 1, updated_at = NOW() WHERE user_id = $1")
        .bind(user_id).execute(&mut *conn).await?;
    Ok(())
}

async fn insert_order_row(conn: &mut PgConnection, order: &Order) -> Result<()> {
    sqlx::query(&format!("INSERT INTO orders ({ORDER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"))
        .bind(order.id)
        .bind(order.user_id)
        .bind(Json(&order.items))
        .bind(order.total_amount.amount())
        .bind(order.total_amount.currency())
        .bind(Json(&order.shipping_address))
        .bind(order.payment_method.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.order_status.as_str())
        .bind(order.stripe_payment_intent_id.as_deref())
        .bind(order.razorpay_order_id.as_deref())
        .bind(order.provider_payment_id.as_deref())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *conn).await?;
    Ok(())
}

async fn update_order_state(conn: &mut PgConnection, order: &Order) -> Result<()> {
    sqlx::query("UPDATE orders SET payment_status = $2, order_status = $3, provider_payment_id = $4, updated_at = $5 WHERE id = $1")
        .bind(order.id)
        .bind(order.payment_status.as_str())
        .bind(order.order_status.as_str())
        .bind(order.provider_payment_id.as_deref())
        .bind(order.updated_at)
        .execute(&mut *conn).await?;
    Ok(())
}

async fn lock_order(conn: &mut PgConnection, order_id: Uuid) -> Result<Order> {
    let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"))
        .bind(order_id).fetch_optional(&mut *conn).await?
        .ok_or_else(|| StorefrontError::NotFound(format!("Order {order_id}")))?;
    row.try_into()
}

fn into_orders(rows: Vec<OrderRow>) -> Result<Vec<Order>> {
    rows.into_iter().map(Order::try_from).collect()
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn product(&self, id: Uuid) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(Product::from))
    }

    async fn products(&self, ids: &[Uuid]) -> Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"))
            .bind(ids).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn find_active_products(&self, filter: &ProductFilter, page: Page) -> Result<Paginated<Product>> {
        const WHERE: &str = "active AND ($1::text IS NULL OR category = $1) \
            AND ($2::text IS NULL OR name ILIKE $2 OR description ILIKE $2)";
        let search = filter.search.as_deref().map(like_pattern);
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE {WHERE} ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4"
        ))
            .bind(filter.category.as_deref()).bind(search.as_deref())
            .bind(i64::from(page.per_page)).bind(page.offset())
            .fetch_all(&self.pool).await?;
        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM products WHERE {WHERE}"))
            .bind(filter.category.as_deref()).bind(search.as_deref())
            .fetch_one(&self.pool).await?;
        Ok(Paginated::new(rows.into_iter().map(Product::from).collect(), total, page))
    }

    async fn decrement_stock(&self, product_id: Uuid, quantity: u32) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        if take_stock(&mut conn, product_id, quantity).await? { return Ok(()); }
        let name: Option<String> = sqlx::query_scalar("SELECT name FROM products WHERE id = $1")
            .bind(product_id).fetch_optional(&mut *conn).await?;
        let name = name.ok_or_else(|| StorefrontError::NotFound(format!("Product {product_id}")))?;
        Err(shortfall(&mut conn, product_id, &name, quantity).await?)
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn cart(&self, user_id: Uuid) -> Result<Cart> {
        let row = sqlx::query_as::<_, CartRow>("SELECT user_id, items, revision, updated_at FROM carts WHERE user_id = $1")
            .bind(user_id).fetch_optional(&self.pool).await?;
        Ok(row.map(Cart::from).unwrap_or_else(|| Cart::new(user_id)))
    }

    async fn save_cart(&self, cart: &mut Cart) -> Result<()> {
        let saved: Option<i64> = sqlx::query_scalar(
            "INSERT INTO carts (user_id, items, revision, updated_at) VALUES ($1, $2, 1, $3) \
             ON CONFLICT (user_id) DO UPDATE SET items = EXCLUDED.items, revision = carts.revision + 1, updated_at = EXCLUDED.updated_at \
             WHERE carts.revision = $4 \
             RETURNING revision",
        )
            .bind(cart.user_id).bind(Json(&cart.items)).bind(cart.updated_at).bind(cart.revision)
            .fetch_optional(&self.pool).await?;
        // an insert lands at revision 1, so a fresh cart racing another fresh cart also conflicts
        match saved {
            Some(revision) if revision == cart.revision + 1 => { cart.revision = revision; Ok(()) }
            _ => Err(StorefrontError::Conflict("Cart".into())),
        }
    }
}

#[async_trait]
impl OrderLedger for PgStore {
    async fn order(&self, id: Uuid) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id).fetch_optional(&self.pool).await?;
        row.map(Order::try_from).transpose()
    }

    async fn find_order(&self, lookup: &OrderLookup) -> Result<Option<Order>> {
        let (column, value) = match lookup {
            OrderLookup::StripePaymentIntent(id) => ("stripe_payment_intent_id", id),
            OrderLookup::RazorpayOrder(id) => ("razorpay_order_id", id),
        };
        let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE {column} = $1"))
            .bind(value).fetch_optional(&self.pool).await?;
        row.map(Order::try_from).transpose()
    }

    async fn orders_for_user(&self, user_id: Uuid, page: Page) -> Result<Paginated<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
            .bind(user_id).bind(i64::from(page.per_page)).bind(page.offset())
            .fetch_all(&self.pool).await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user_id).fetch_one(&self.pool).await?;
        Ok(Paginated::new(into_orders(rows)?, total, page))
    }

    async fn all_orders(&self, status: Option<OrderStatus>, page: Page) -> Result<Paginated<Order>> {
        let status = status.map(|s| s.as_str());
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE ($1::text IS NULL OR order_status = $1) \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
            .bind(status).bind(i64::from(page.per_page)).bind(page.offset())
            .fetch_all(&self.pool).await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE ($1::text IS NULL OR order_status = $1)")
            .bind(status).fetch_one(&self.pool).await?;
        Ok(Paginated::new(into_orders(rows)?, total, page))
    }

    async fn insert_order(&self, order: &Order) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        insert_order_row(&mut conn, order).await
    }

    async fn commit_cash_order(&self, order: &Order, cart_revision: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let current: Option<i64> = sqlx::query_scalar("SELECT revision FROM carts WHERE user_id = $1 FOR UPDATE")
            .bind(order.user_id).fetch_optional(&mut *tx).await?;
        if current.unwrap_or(0) != cart_revision { return Err(StorefrontError::Conflict("Cart".into())); }
        for (product_id, (quantity, name)) in demand(order.items()) {
            if !take_stock(&mut tx, product_id, quantity).await? {
                // dropping `tx` rolls back the decrements already taken
                return Err(shortfall(&mut tx, product_id, name, quantity).await?);
            }
        }
        insert_order_row(&mut tx, order).await?;
        clear_cart(&mut tx, order.user_id).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn finalize_payment(&self, order_id: Uuid, payment_id: &str) -> Result<Finalization> {
        let mut tx = self.pool.begin().await?;
        let mut order = lock_order(&mut tx, order_id).await?;
        if !order.mark_paid(payment_id) { return Ok(Finalization::AlreadyPaid(order)); }

        update_order_state(&mut tx, &order).await?;
        if order.order_status == OrderStatus::Cancelled {
            tx.commit().await?;
            return Ok(Finalization::PaidAfterCancel(order));
        }
        let mut oversold = vec![];
        for (product_id, (quantity, _)) in demand(order.items()) {
            if take_stock(&mut tx, product_id, quantity).await? { continue; }
            let clamped = sqlx::query("UPDATE products SET stock = 0, updated_at = NOW() WHERE id = $1")
                .bind(product_id).execute(&mut *tx).await?;
            if clamped.rows_affected() == 1 {
                oversold.push(product_id);
            } else {
                warn!(%order_id, %product_id, "paid order references a product that no longer exists");
            }
        }
        clear_cart(&mut tx, order.user_id).await?;
        tx.commit().await?;
        Ok(Finalization::Applied { order, oversold })
    }

    async fn mark_payment_failed(&self, order_id: Uuid) -> Result<Option<Order>> {
        let mut tx = self.pool.begin().await?;
        let mut order = lock_order(&mut tx, order_id).await?;
        if !order.mark_payment_failed() { return Ok(None); }
        update_order_state(&mut tx, &order).await?;
        tx.commit().await?;
        Ok(Some(order))
    }

    async fn transition_order(&self, order_id: Uuid, next: OrderStatus) -> Result<Order> {
        let mut tx = self.pool.begin().await?;
        let mut order = lock_order(&mut tx, order_id).await?;
        order.transition_to(next)?;
        update_order_state(&mut tx, &order).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn stats(&self) -> Result<LedgerStats> {
        let stats = sqlx::query_as::<_, LedgerStats>(
            "SELECT \
                (SELECT COUNT(*) FROM orders) AS total_orders, \
                (SELECT COALESCE(SUM(total_amount), 0) FROM orders WHERE payment_status = 'paid') AS revenue, \
                (SELECT COUNT(*) FROM users) AS total_users, \
                (SELECT COUNT(*) FROM products) AS total_products",
        )
            .fetch_one(&self.pool).await?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("mug"), "%mug%");
    }
}
