//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::Product;

/// A user's pending selections. `revision` is bumped on every save and guards
/// concurrent writers.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub(crate) user_id: Uuid,
    pub(crate) items: Vec<CartItem>,
    pub(crate) revision: i64,
    pub(crate) updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: Uuid,
    pub quantity: u32,
}

/// What a cart mutation ended up doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CartUpdate {
    Added,
    Incremented,
    Updated,
    Removed,
    /// The requested quantity was above stock and was clamped to it.
    QuantityLimited,
}

impl Cart {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id, items: vec![], revision: 0, updated_at: Utc::now() }
    }

    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn revision(&self) -> i64 { self.revision }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn quantity_of(&self, product_id: Uuid) -> Option<u32> {
        self.items.iter().find(|i| i.product_id == product_id).map(|i| i.quantity)
    }

    /// Adds one unit of `product`. Increments are capped at the product's stock.
    pub fn add_item(&mut self, product: &Product) -> Result<CartUpdate, CartError> {
        let stock = product.stock();
        let Some(pos) = self.position(product.id()) else {
            if !product.is_in_stock() { return Err(CartError::OutOfStock(product.id())); }
            self.items.push(CartItem { product_id: product.id(), quantity: 1 });
            self.touch();
            return Ok(CartUpdate::Added);
        };
        let wanted = self.items[pos].quantity.saturating_add(1);
        let update = if wanted > stock { CartUpdate::QuantityLimited } else { CartUpdate::Incremented };
        self.store_quantity(pos, wanted.min(stock));
        Ok(update)
    }

    /// Sets the quantity of a line already in the cart. Zero or less removes it.
    pub fn set_quantity(&mut self, product: &Product, quantity: i64) -> Result<CartUpdate, CartError> {
        let pos = self.position(product.id()).ok_or(CartError::ItemNotFound)?;
        if quantity <= 0 {
            self.items.remove(pos);
            self.touch();
            return Ok(CartUpdate::Removed);
        }
        let stock = product.stock();
        let wanted = u32::try_from(quantity).unwrap_or(u32::MAX);
        let update = if wanted > stock { CartUpdate::QuantityLimited } else { CartUpdate::Updated };
        self.store_quantity(pos, wanted.min(stock));
        Ok(update)
    }

    pub fn remove_item(&mut self, product_id: Uuid) -> Result<(), CartError> {
        let pos = self.position(product_id).ok_or(CartError::ItemNotFound)?;
        self.items.remove(pos);
        self.touch();
        Ok(())
    }

    pub fn clear(&mut self) { self.items.clear(); self.touch(); }

    fn position(&self, product_id: Uuid) -> Option<usize> {
        self.items.iter().position(|i| i.product_id == product_id)
    }

    // a clamped quantity of zero drops the line; cart quantities stay positive
    fn store_quantity(&mut self, pos: usize, quantity: u32) {
        if quantity == 0 { self.items.remove(pos); } else { self.items[pos].quantity = quantity; }
        self.touch();
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CartError { OutOfStock(Uuid), ItemNotFound }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfStock(id) => write!(f, "Product {id} is out of stock"),
            Self::ItemNotFound => write!(f, "Item not found"),
        }
    }
}
