//! Core types for SmartShop.
//!
//! This module provides type-safe wrappers for the point-of-sale domain.

pub mod cart;
pub mod id;
pub mod invoice;
pub mod price;
pub mod product;

pub use cart::{Cart, CartItem};
pub use id::*;
pub use invoice::{Invoice, InvoiceError, PaymentMethod};
pub use price::format_vnd;
pub use product::{DEFAULT_CATEGORY, DEFAULT_UNIT, DraftError, Product, ProductDraft};
