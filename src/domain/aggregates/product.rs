//! Product Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::{Money, Quantity};

pub const MAX_IMAGES: usize = 3;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) category: String,
    pub(crate) price: Money,
    pub(crate) stock: Quantity,
    pub(crate) images: Vec<String>,
    pub(crate) active: bool,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl Product {
    pub fn create(name: impl Into<String>, category: impl Into<String>, price: Money) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), name: name.into(), description: String::new(), category: category.into(),
            price, stock: Quantity::default(), images: vec![], active: false, created_at: now, updated_at: now,
        }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn description(&self) -> &str { &self.description }
    pub fn category(&self) -> &str { &self.category }
    pub fn price(&self) -> &Money { &self.price }
    pub fn stock(&self) -> u32 { self.stock.value() }
    pub fn images(&self) -> &[String] { &self.images }
    pub fn primary_image(&self) -> Option<&str> { self.images.first().map(String::as_str) }
    pub fn is_active(&self) -> bool { self.active }
    pub fn is_in_stock(&self) -> bool { !self.stock.is_zero() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    pub fn publish(&mut self) -> Result<(), ProductError> {
        if self.name.trim().is_empty() { return Err(ProductError::MissingName); }
        self.active = true;
        self.touch();
        Ok(())
    }

    pub fn update_price(&mut self, new_price: Money) {
        self.price = new_price;
        self.touch();
    }

    pub fn add_image(&mut self, url: impl Into<String>) -> Result<(), ProductError> {
        if self.images.len() >= MAX_IMAGES { return Err(ProductError::TooManyImages); }
        self.images.push(url.into());
        self.touch();
        Ok(())
    }

    pub fn add_stock(&mut self, qty: u32) {
        self.stock = self.stock.add(qty);
        self.touch();
    }

    pub fn remove_stock(&mut self, qty: u32) -> Result<(), ProductError> {
        self.stock = self.stock.subtract(qty).ok_or(ProductError::InsufficientStock)?;
        self.touch();
        Ok(())
    }

    /// Forces stock to zero. Only used when a paid order outran the stock.
    pub(crate) fn deplete(&mut self) { self.stock = Quantity::default(); self.touch(); }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum ProductError { MissingName, TooManyImages, InsufficientStock }
impl std::error::Error for ProductError {}
impl std::fmt::Display for ProductError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingName => write!(f, "Missing name"),
            Self::TooManyImages => write!(f, "A product has at most {MAX_IMAGES} images"),
            Self::InsufficientStock => write!(f, "Insufficient stock"),
        }
    }
}
