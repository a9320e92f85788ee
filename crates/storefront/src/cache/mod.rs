//! Durable last-known copy of the product and invoice collections.
//!
//! The cache is a fallback substrate only. It is read at startup when there
//! is no remote store and on entering a degraded state, and written through
//! while the remote store is unavailable. It never fails: storage errors are
//! logged and swallowed.

mod seed;

pub use seed::seed_products;

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use smartshop_core::{Invoice, Product};
use tracing::{debug, warn};

/// Storage key for the product collection.
pub const PRODUCTS_KEY: &str = "smartshop_products";
/// Storage key for the invoice collection.
pub const INVOICES_KEY: &str = "smartshop_invoices";

/// Raw key-value storage under the cache.
pub trait CacheBackend: Send + Sync {
    /// Read the stored text for a key, `Ok(None)` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    fn read(&self, key: &str) -> io::Result<Option<String>>;

    /// Replace the stored text for a key.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    fn write(&self, key: &str, value: &str) -> io::Result<()>;
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl CacheBackend for FileBackend {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.path(key)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let target = self.path(key);
        // Write then rename so a crash never leaves a truncated file
        let staging = self.dir.join(format!(".{key}.json.tmp"));
        std::fs::write(&staging, value)?;
        std::fs::rename(&staging, &target)
    }
}

/// Shared in-process storage. Clones see the same entries, which lets tests
/// simulate an application restart over the same "disk".
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw text under a key, bypassing serialization.
    pub fn insert_raw(&self, key: &str, value: impl Into<String>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.into());
    }

    #[must_use]
    pub fn get_raw(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl CacheBackend for MemoryBackend {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.get_raw(key))
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        self.insert_raw(key, value);
        Ok(())
    }
}

/// Typed product and invoice persistence over a [`CacheBackend`].
#[derive(Debug, Clone)]
pub struct LocalCache<B> {
    backend: B,
}

impl<B: CacheBackend> LocalCache<B> {
    pub const fn new(backend: B) -> Self {
        Self { backend }
    }

    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Stored products, or the seed catalog if nothing usable is stored.
    #[must_use]
    pub fn load_products(&self) -> Vec<Product> {
        self.load(PRODUCTS_KEY).unwrap_or_else(seed_products)
    }

    /// Stored invoices, or none.
    #[must_use]
    pub fn load_invoices(&self) -> Vec<Invoice> {
        self.load(INVOICES_KEY).unwrap_or_default()
    }

    pub fn save_products(&self, products: &[Product]) {
        self.save(PRODUCTS_KEY, products);
    }

    pub fn save_invoices(&self, invoices: &[Invoice]) {
        self.save(INVOICES_KEY, invoices);
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Option<Vec<T>> {
        let text = match self.backend.read(key) {
            Ok(Some(text)) => text,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "failed to read local cache");
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(records) => Some(records),
            Err(e) => {
                warn!(key, error = %e, "local cache is unreadable, ignoring it");
                None
            }
        }
    }

    fn save<T: Serialize>(&self, key: &str, records: &[T]) {
        let text = match serde_json::to_string(records) {
            Ok(text) => text,
            Err(e) => {
                warn!(key, error = %e, "failed to serialize local cache");
                return;
            }
        };
        if let Err(e) = self.backend.write(key, &text) {
            warn!(key, error = %e, "failed to write local cache");
            return;
        }
        debug!(key, count = records.len(), "local cache saved");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use smartshop_core::{CartItem, PaymentMethod, ProductId};

    use super::*;

    fn product() -> Product {
        Product {
            id: ProductId::new("1717000000000"),
            name: "Trà Xanh 0 Độ".to_string(),
            price: Decimal::from(10_000),
            category: "Đồ uống".to_string(),
            stock: 24,
            unit: "chai".to_string(),
        }
    }

    #[test]
    fn test_empty_cache_returns_seed_and_no_invoices() {
        let cache = LocalCache::new(MemoryBackend::new());
        assert_eq!(cache.load_products(), seed_products());
        assert!(cache.load_invoices().is_empty());
    }

    #[test]
    fn test_unreadable_text_falls_back() {
        let backend = MemoryBackend::new();
        backend.insert_raw(PRODUCTS_KEY, "{not json");
        backend.insert_raw(INVOICES_KEY, "[{\"id\": 3}]");
        let cache = LocalCache::new(backend);
        assert_eq!(cache.load_products().len(), 8);
        assert!(cache.load_invoices().is_empty());
    }

    #[test]
    fn test_saved_products_replace_seed() {
        let cache = LocalCache::new(MemoryBackend::new());
        cache.save_products(&[product()]);
        assert_eq!(cache.load_products(), vec![product()]);

        cache.save_products(&[]);
        assert!(cache.load_products().is_empty());
    }

    #[test]
    fn test_invoice_payload_shape() {
        let backend = MemoryBackend::new();
        let cache = LocalCache::new(backend.clone());
        let invoice = Invoice::commit(
            vec![CartItem::new(product(), 2)],
            PaymentMethod::Debt,
            Utc::now(),
        )
        .unwrap();
        cache.save_invoices(std::slice::from_ref(&invoice));

        let raw: serde_json::Value =
            serde_json::from_str(&backend.get_raw(INVOICES_KEY).unwrap()).unwrap();
        assert_eq!(raw[0]["paymentMethod"], "debt");
        assert_eq!(raw[0]["items"][0]["quantity"], 2);
        assert_eq!(raw[0]["items"][0]["name"], "Trà Xanh 0 Độ");
        assert_eq!(cache.load_invoices(), vec![invoice]);
    }

    #[test]
    fn test_file_backend_round_trip() {
        let dir = std::env::temp_dir().join(format!("smartshop-cache-{}", uuid::Uuid::new_v4()));
        let backend = FileBackend::new(&dir);
        assert!(backend.read(PRODUCTS_KEY).unwrap().is_none());

        let cache = LocalCache::new(backend);
        cache.save_products(&[product()]);
        assert!(dir.join("smartshop_products.json").exists());
        assert_eq!(cache.load_products(), vec![product()]);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
