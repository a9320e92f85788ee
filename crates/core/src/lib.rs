//! SmartShop Core - Shared domain types.
//!
//! This crate provides the records the point of sale works with:
//! - products and the drafts used to create or edit them
//! - the in-progress cart and its line items
//! - committed invoices and payment methods
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no remote
//! store access, no HTTP clients. The storefront crate owns synchronization,
//! caching, and checkout on top of these types.
//!
//! # Modules
//!
//! - [`types`] - IDs, money formatting, products, carts, invoices

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
