//! Committed sales.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::cart::CartItem;
use super::id::InvoiceId;

/// How the customer settled the invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    /// Bank transfer, usually via a VietQR code.
    Transfer,
    /// Recorded as customer debt, settled later.
    Debt,
}

impl PaymentMethod {
    /// Label printed on the receipt.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Cash => "Tiền mặt",
            Self::Transfer => "Chuyển khoản",
            Self::Debt => "Ghi nợ",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cash => write!(f, "cash"),
            Self::Transfer => write!(f, "transfer"),
            Self::Debt => write!(f, "debt"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cash" => Ok(Self::Cash),
            "transfer" | "bank-transfer" => Ok(Self::Transfer),
            "debt" | "deferred-debt" => Ok(Self::Debt),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}

/// Errors building an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvoiceError {
    #[error("cannot create an invoice without items")]
    Empty,
}

/// A committed sale.
///
/// The item list and total are frozen at commit time; the total is never
/// recomputed from the items afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: InvoiceId,
    pub date: DateTime<Utc>,
    pub items: Vec<CartItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub payment_method: PaymentMethod,
}

impl Invoice {
    /// Freeze cart lines into an invoice dated `at`, with a receipt number
    /// derived from the same instant.
    ///
    /// # Errors
    ///
    /// Returns `InvoiceError::Empty` if there are no items.
    pub fn commit(
        items: Vec<CartItem>,
        payment_method: PaymentMethod,
        at: DateTime<Utc>,
    ) -> Result<Self, InvoiceError> {
        if items.is_empty() {
            return Err(InvoiceError::Empty);
        }
        let total = items.iter().map(CartItem::line_total).sum();
        Ok(Self {
            id: InvoiceId::from_timestamp(at),
            date: at,
            items,
            total,
            payment_method,
        })
    }

    /// Total number of units sold.
    #[must_use]
    pub fn unit_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }
}
