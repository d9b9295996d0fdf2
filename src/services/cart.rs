//! Cart workflows. Each mutation is load, mutate, then a revision-checked save.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartUpdate, Product};
use crate::domain::value_objects::Money;
use crate::store::Store;
use crate::{Result, StorefrontError};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub price: Money,
    pub stock: u32,
    pub image: Option<String>,
    pub active: bool,
}

impl From<&Product> for ProductSummary {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id(), name: p.name().to_string(), price: p.price().clone(), stock: p.stock(),
            image: p.primary_image().map(str::to_string), active: p.is_active(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: u32,
    /// `None` when the product no longer exists.
    pub product: Option<ProductSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartLine>,
    /// At current prices, over lines whose product still exists.
    pub subtotal: Money,
    pub revision: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartMutation {
    pub cart: CartView,
    pub status: CartUpdate,
}

#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn Store>,
    currency: String,
}

impl CartService {
    pub fn new(store: Arc<dyn Store>, currency: impl Into<String>) -> Self {
        Self { store, currency: currency.into() }
    }

    pub async fn view(&self, user_id: Uuid) -> Result<CartView> {
        let cart = self.store.cart(user_id).await?;
        self.resolve(&cart).await
    }

    #[instrument(skip(self))]
    pub async fn add_item(&self, user_id: Uuid, product_id: Uuid) -> Result<CartMutation> {
        let product = self.active_product(product_id).await?;
        let mut cart = self.store.cart(user_id).await?;
        let status = cart.add_item(&product)?;
        self.save(cart, status).await
    }

    #[instrument(skip(self))]
    pub async fn set_quantity(&self, user_id: Uuid, product_id: Uuid, quantity: i64) -> Result<CartMutation> {
        let product = self.active_product(product_id).await?;
        let mut cart = self.store.cart(user_id).await?;
        let status = cart.set_quantity(&product, quantity)?;
        self.save(cart, status).await
    }

    pub async fn remove_item(&self, user_id: Uuid, product_id: Uuid) -> Result<CartMutation> {
        let mut cart = self.store.cart(user_id).await?;
        cart.remove_item(product_id)?;
        self.save(cart, CartUpdate::Removed).await
    }

    pub async fn clear(&self, user_id: Uuid) -> Result<CartView> {
        let mut cart = self.store.cart(user_id).await?;
        if cart.is_empty() { return self.resolve(&cart).await; }
        cart.clear();
        self.store.save_cart(&mut cart).await?;
        self.resolve(&cart).await
    }

    async fn active_product(&self, product_id: Uuid) -> Result<Product> {
        self.store.product(product_id).await?
            .filter(Product::is_active)
            .ok_or_else(|| StorefrontError::NotFound(format!("Product {product_id}")))
    }

    async fn save(&self, mut cart: Cart, status: CartUpdate) -> Result<CartMutation> {
        self.store.save_cart(&mut cart).await?;
        debug!(user_id = %cart.user_id(), revision = cart.revision(), ?status, "cart saved");
        Ok(CartMutation { cart: self.resolve(&cart).await?, status })
    }

    async fn resolve(&self, cart: &Cart) -> Result<CartView> {
        let ids: Vec<Uuid> = cart.items().iter().map(|i| i.product_id).collect();
        let products: HashMap<Uuid, Product> = self.store.products(&ids).await?
            .into_iter()
            .map(|p| (p.id(), p))
            .collect();

        let mut subtotal: Option<Money> = None;
        let mut items = Vec::with_capacity(cart.items().len());
        for item in cart.items() {
            let product = products.get(&item.product_id);
            if let Some(p) = product {
                let line = p.price().multiply(item.quantity);
                subtotal = Some(match subtotal { Some(sum) => sum.add(&line)?, None => line });
            }
            items.push(CartLine { product_id: item.product_id, quantity: item.quantity, product: product.map(ProductSummary::from) });
        }
        Ok(CartView {
            items,
            subtotal: subtotal.unwrap_or_else(|| Money::new(Decimal::ZERO, &self.currency)),
            revision: cart.revision(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    async fn service_with(stock: u32, price: i64) -> (CartService, Product) {
        let store = Arc::new(MemoryStore::new());
        let mut p = Product::create("Mug", "kitchen", Money::new(Decimal::new(price, 0), "INR"));
        p.add_stock(stock);
        p.publish().unwrap();
        store.upsert_product(p.clone()).await;
        (CartService::new(store, "INR"), p)
    }

    #[tokio::test]
    async fn test_add_then_increment_reports_limit() {
        let (carts, p) = service_with(1, 100).await;
        let user = Uuid::new_v4();
        assert_eq!(carts.add_item(user, p.id()).await.unwrap().status, CartUpdate::Added);
        let second = carts.add_item(user, p.id()).await.unwrap();
        assert_eq!(second.status, CartUpdate::QuantityLimited);
        assert_eq!(second.cart.items[0].quantity, 1);
    }

    #[tokio::test]
    async fn test_subtotal_follows_current_price() {
        let (carts, p) = service_with(5, 40).await;
        let user = Uuid::new_v4();
        carts.add_item(user, p.id()).await.unwrap();
        let view = carts.set_quantity(user, p.id(), 3).await.unwrap().cart;
        assert_eq!(view.subtotal, Money::new(Decimal::new(120, 0), "INR"));
    }

    #[tokio::test]
    async fn test_inactive_product_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let draft = Product::create("Draft", "misc", Money::zero("INR"));
        store.upsert_product(draft.clone()).await;
        let carts = CartService::new(store, "INR");
        let err = carts.add_item(Uuid::new_v4(), draft.id()).await.unwrap_err();
        assert!(matches!(err, StorefrontError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_cart_view() {
        let (carts, _) = service_with(1, 1).await;
        let view = carts.view(Uuid::new_v4()).await.unwrap();
        assert!(view.items.is_empty());
        assert_eq!(view.subtotal, Money::zero("INR"));
        assert_eq!(view.revision, 0);
    }
}
