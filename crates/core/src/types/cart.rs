//! The in-progress cart.
//!
//! A cart exists only until checkout commits it into an invoice or the clerk
//! clears it; it is never persisted on its own.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::line_total;
use super::product::Product;

/// A product snapshot plus the quantity being sold.
///
/// Serializes flat (the product fields followed by `quantity`), which is the
/// shape stored inside invoices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    #[serde(flatten)]
    pub product: Product,
    /// Always at least 1.
    pub quantity: u32,
}

impl CartItem {
    /// Create a line item. Quantities below 1 are raised to 1.
    #[must_use]
    pub fn new(product: Product, quantity: u32) -> Self {
        Self {
            product,
            quantity: quantity.max(1),
        }
    }

    #[must_use]
    pub const fn id(&self) -> &ProductId {
        &self.product.id
    }

    /// Price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        line_total(self.product.price, self.quantity)
    }
}

/// Ordered line items awaiting checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Add `quantity` of a product, merging with an existing line for the
    /// same product. Returns the line's new quantity.
    pub fn add(&mut self, product: &Product, quantity: u32) -> u32 {
        let quantity = quantity.max(1);
        if let Some(item) = self.items.iter_mut().find(|item| item.id() == &product.id) {
            item.quantity = item.quantity.saturating_add(quantity);
            return item.quantity;
        }
        self.items.push(CartItem::new(product.clone(), quantity));
        quantity
    }

    /// Remove the line for a product. Returns whether a line was removed.
    pub fn remove(&mut self, id: &ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id() != id);
        self.items.len() != before
    }

    /// Change a line's quantity by `delta`, never going below 1.
    ///
    /// Returns the new quantity, or `None` if the product is not in the cart.
    pub fn adjust(&mut self, id: &ProductId, delta: i64) -> Option<u32> {
        let item = self.items.iter_mut().find(|item| item.id() == id)?;
        let next = (i64::from(item.quantity) + delta).clamp(1, i64::from(u32::MAX));
        item.quantity = u32::try_from(next).unwrap_or(u32::MAX);
        Some(item.quantity)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Sum of price × quantity over every line.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Quantity in the cart for a product (0 if absent).
    #[must_use]
    pub fn quantity_of(&self, id: &ProductId) -> u32 {
        self.items
            .iter()
            .find(|item| item.id() == id)
            .map_or(0, |item| item.quantity)
    }
}
