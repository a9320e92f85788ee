//! Integration tests for SmartShop.
//!
//! Scenarios run the real controller against the in-process remote store
//! and an in-memory cache, so no network or disk is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p smartshop-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `sync` - pushes, degradation, self-healing, resubscription
//! - `checkout` - invoice and stock consistency on both commit paths
//! - `degraded` - deletes, saves, and restarts while the backend is unusable

use smartshop_core::{Product, ProductId};
use smartshop_storefront::announce::RecordingAnnouncer;
use smartshop_storefront::cache::{LocalCache, MemoryBackend, seed_products};
use smartshop_storefront::controller::Controller;
use smartshop_storefront::health::RemediationLinks;
use smartshop_storefront::remote::MemoryRemote;

pub type TestController = Controller<MemoryRemote, MemoryBackend>;

/// A controller wired to shared fakes.
///
/// The remote store and cache backend outlive the controller, so a test can
/// build a second controller over them to simulate a restart.
pub struct Harness {
    pub remote: MemoryRemote,
    pub backend: MemoryBackend,
    pub announcer: RecordingAnnouncer,
    pub controller: TestController,
}

impl Harness {
    /// Remote store holding the seed catalog, controller started and synced.
    #[must_use]
    pub fn seeded() -> Self {
        Self::with_remote(MemoryRemote::with_products(&seed_products()))
    }

    /// Start a controller against an existing remote store.
    #[must_use]
    pub fn with_remote(remote: MemoryRemote) -> Self {
        let backend = MemoryBackend::new();
        let announcer = RecordingAnnouncer::new();
        let controller = boot(Some(remote.clone()), &backend, &announcer);
        Self {
            remote,
            backend,
            announcer,
            controller,
        }
    }

    /// A fresh controller over the same remote store and cache.
    #[must_use]
    pub fn restart(&self) -> TestController {
        boot(Some(self.remote.clone()), &self.backend, &self.announcer)
    }

    /// A fresh controller over the same cache with no remote configured.
    #[must_use]
    pub fn restart_offline(&self) -> TestController {
        boot(None, &self.backend, &self.announcer)
    }

    /// Current stock of a product as the controller sees it.
    ///
    /// # Panics
    ///
    /// Panics if the product is not listed.
    #[must_use]
    pub fn stock(&self, id: &str) -> u32 {
        stock_in(self.controller.products(), id)
    }

    /// Current stock of a product in the remote store.
    ///
    /// # Panics
    ///
    /// Panics if the product does not exist remotely.
    #[must_use]
    pub fn remote_stock(&self, id: &str) -> u32 {
        stock_in(&self.remote.products(), id)
    }
}

fn boot(
    remote: Option<MemoryRemote>,
    backend: &MemoryBackend,
    announcer: &RecordingAnnouncer,
) -> TestController {
    let mut controller = Controller::new(remote, LocalCache::new(backend.clone()))
        .with_announcer(announcer.clone())
        .with_links(RemediationLinks {
            setup: "https://console.cloud.google.com/datastore/setup?project=test".to_string(),
            rules: "https://console.firebase.google.com/project/test/firestore/rules".to_string(),
        });
    controller.start();
    controller.pump();
    controller
}

fn stock_in(products: &[Product], id: &str) -> u32 {
    let id = ProductId::new(id);
    products
        .iter()
        .find(|p| p.id == id)
        .map(|p| p.stock)
        .unwrap_or_else(|| panic!("product {id} is not listed"))
}
