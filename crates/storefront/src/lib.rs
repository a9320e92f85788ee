//! SmartShop point-of-sale engine.
//!
//! Keeps an in-memory catalog and invoice history consistent with a remote
//! document store, falls back to a durable local cache when the store is
//! unreachable, and commits checkouts atomically on either path.
//!
//! # Modules
//!
//! - [`remote`] - remote store trait, error classifier, Firestore and
//!   in-memory clients
//! - [`cache`] - local fallback persistence
//! - [`health`] - backend health state machine
//! - [`controller`] - reconciliation, products, cart, checkout, voice
//! - [`voice`] - speech-to-intent classifier
//! - [`console`] - line console used by the `smartshop` binary

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod announce;
pub mod cache;
pub mod config;
pub mod console;
pub mod controller;
pub mod error;
pub mod health;
pub mod payment;
pub mod remote;
pub mod state;
pub mod voice;

pub use controller::{CheckoutReceipt, CommitPath, Controller, SaveOutcome, VoiceOutcome};
pub use error::PosError;
pub use health::{BackendHealth, Banner, DegradedReason};
