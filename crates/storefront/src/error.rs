//! Controller-level errors with Sentry integration.
//!
//! Remote failures are normally absorbed by the controller (health changes,
//! local fallback). Only the cases the clerk must act on surface here.

use smartshop_core::{DraftError, InvoiceId, ProductId};
use thiserror::Error;

use crate::remote::RemoteError;

#[derive(Debug, Error)]
pub enum PosError {
    /// Checkout was requested with nothing in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// The product draft failed validation.
    #[error("Invalid product: {0}")]
    InvalidDraft(#[from] DraftError),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Invoice not found: {0}")]
    InvoiceNotFound(InvoiceId),

    /// Security rules rejected a delete. Nothing was changed.
    #[error("Cannot delete: the database rules block deletes. Open the rules page, allow writes, then retry ({0})")]
    DeleteDenied(RemoteError),
}

impl PosError {
    /// Report errors that point at a misconfigured backend to Sentry.
    pub fn capture(&self) {
        if matches!(self, Self::DeleteDenied(_)) {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Delete rejected by remote store"
            );
        }
    }
}
