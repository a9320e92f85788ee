//! Catalog products and the drafts used to create or edit them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::ProductId;

/// Category assigned when a new product is saved without one.
pub const DEFAULT_CATEGORY: &str = "Khác";

/// Unit of measure assigned when a new product is saved without one.
pub const DEFAULT_UNIT: &str = "cái";

/// A product in the shop catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Unit price in đồng. Never negative.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub category: String,
    /// Units on hand.
    pub stock: u32,
    /// Unit of measure label (e.g. "lon", "gói").
    pub unit: String,
}

impl Product {
    /// Case-insensitive substring match against name and category.
    ///
    /// An empty term matches every product.
    #[must_use]
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.name.to_lowercase().contains(&term) || self.category.to_lowercase().contains(&term)
    }
}

/// Validation failures for a [`ProductDraft`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("product name is required")]
    EmptyName,
    #[error("product price is required")]
    MissingPrice,
    #[error("product price cannot be negative (got {0})")]
    NegativePrice(Decimal),
}

/// Partial product data from the inventory editor.
///
/// A draft without an `id` creates a product; a draft with an `id` edits the
/// existing record and only overwrites the fields it carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductDraft {
    pub id: Option<ProductId>,
    pub name: String,
    pub price: Option<Decimal>,
    pub category: Option<String>,
    pub stock: Option<u32>,
    pub unit: Option<String>,
}

impl ProductDraft {
    /// Start a draft for a new product.
    #[must_use]
    pub fn new(name: impl Into<String>, price: Decimal) -> Self {
        Self {
            name: name.into(),
            price: Some(price),
            ..Self::default()
        }
    }

    /// Start a draft that edits an existing product.
    #[must_use]
    pub fn edit(product: &Product) -> Self {
        Self {
            id: Some(product.id.clone()),
            name: product.name.clone(),
            price: Some(product.price),
            category: Some(product.category.clone()),
            stock: Some(product.stock),
            unit: Some(product.unit.clone()),
        }
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub const fn with_stock(mut self, stock: u32) -> Self {
        self.stock = Some(stock);
        self
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Check the draft can be promoted to a [`Product`].
    ///
    /// # Errors
    ///
    /// Returns `DraftError` if the name is blank or the price is missing or
    /// negative.
    pub fn validate(&self) -> Result<Decimal, DraftError> {
        if self.name.trim().is_empty() {
            return Err(DraftError::EmptyName);
        }
        let price = self.price.ok_or(DraftError::MissingPrice)?;
        if price.is_sign_negative() && !price.is_zero() {
            return Err(DraftError::NegativePrice(price));
        }
        Ok(price)
    }

    /// Promote to a brand new product with the given ID, filling defaults.
    ///
    /// # Errors
    ///
    /// Returns `DraftError` if validation fails.
    pub fn into_product(self, id: ProductId) -> Result<Product, DraftError> {
        let price = self.validate()?;
        Ok(Product {
            id,
            name: self.name.trim().to_string(),
            price,
            category: non_blank(self.category).unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            stock: self.stock.unwrap_or(0),
            unit: non_blank(self.unit).unwrap_or_else(|| DEFAULT_UNIT.to_string()),
        })
    }

    /// Merge this draft over an existing product, keeping fields the draft
    /// does not carry.
    ///
    /// # Errors
    ///
    /// Returns `DraftError` if validation fails.
    pub fn apply_to(&self, existing: &Product) -> Result<Product, DraftError> {
        let price = self.validate()?;
        Ok(Product {
            id: existing.id.clone(),
            name: self.name.trim().to_string(),
            price,
            category: non_blank(self.category.clone()).unwrap_or_else(|| existing.category.clone()),
            stock: self.stock.unwrap_or(existing.stock),
            unit: non_blank(self.unit.clone()).unwrap_or_else(|| existing.unit.clone()),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
