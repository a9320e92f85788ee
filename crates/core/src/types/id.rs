//! Newtype IDs for type-safe record references.
//!
//! Document IDs are opaque strings: the remote store assigns them on create,
//! and offline writes derive them from the current timestamp. Use the
//! `define_id!` macro to create wrappers that prevent mixing IDs of different
//! record types.

use chrono::{DateTime, Utc};

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_str()`
/// - `From<String>`, `From<&str>` and `Into<String>` implementations
///
/// # Example
///
/// ```rust
/// # use smartshop_core::define_id;
/// define_id!(ShelfId);
/// define_id!(SupplierId);
///
/// let shelf = ShelfId::new("a-1");
/// let supplier = SupplierId::new("a-1");
///
/// // These are different types, so this won't compile:
/// // let _: ShelfId = supplier;
/// # let _ = (shelf, supplier);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(ProductId);
define_id!(InvoiceId);

impl ProductId {
    /// ID for a product created while the remote store is unavailable.
    ///
    /// Uses the full millisecond timestamp.
    #[must_use]
    pub fn from_timestamp(at: DateTime<Utc>) -> Self {
        Self(at.timestamp_millis().to_string())
    }
}

impl InvoiceId {
    /// Receipt number printed on invoices: `HD-` followed by the last six
    /// digits of the millisecond timestamp.
    #[must_use]
    pub fn from_timestamp(at: DateTime<Utc>) -> Self {
        let millis = at.timestamp_millis().rem_euclid(1_000_000);
        Self(format!("HD-{millis:06}"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_invoice_id_uses_last_six_digits() {
        let at = Utc.timestamp_millis_opt(1_718_000_123_456).single();
        let id = InvoiceId::from_timestamp(at.unwrap_or_default());
        assert_eq!(id.as_str(), "HD-123456");
    }

    #[test]
    fn test_invoice_id_pads_short_suffix() {
        let at = Utc.timestamp_millis_opt(1_000_000_000_042).single();
        let id = InvoiceId::from_timestamp(at.unwrap_or_default());
        assert_eq!(id.as_str(), "HD-000042");
    }

    #[test]
    fn test_product_id_from_timestamp() {
        let at = Utc.timestamp_millis_opt(1_718_000_123_456).single();
        let id = ProductId::from_timestamp(at.unwrap_or_default());
        assert_eq!(id.to_string(), "1718000123456");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let id = ProductId::new("abc");
        assert_eq!(serde_json::to_string(&id).ok().as_deref(), Some("\"abc\""));
    }
}
