//! Reconciliation controller.
//!
//! Owns the in-memory products and invoices and decides, per mutation,
//! whether the remote store or the local cache is the writer. Remote
//! subscriptions feed a single event channel; events are applied one at a
//! time by [`Controller::handle_event`], and events from torn-down
//! subscriptions are dropped by generation.
//!
//! While the backend is degraded (or never configured) every mutation is
//! written through to the [`LocalCache`] so a restart resumes from it.

mod checkout;
mod voice;

pub use checkout::{CheckoutPlan, CheckoutReceipt, CommitPath, StockChange};
pub use voice::VoiceOutcome;

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use smartshop_core::{Invoice, InvoiceId, Product, ProductDraft, ProductId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::announce::{Announcer, LogAnnouncer, spoken_amount};
use crate::cache::{CacheBackend, LocalCache};
use crate::config::BankConfig;
use crate::error::PosError;
use crate::health::{BackendHealth, Banner, DegradedReason, HealthMonitor, RemediationLinks, Transition};
use crate::remote::conversions::{decode_invoices, decode_products, draft_fields, product_fields};
use crate::remote::{Collection, FeedEvent, FeedPayload, FeedSink, RemoteError, RemoteStore, Subscription};
use crate::state::AppState;

/// Result of saving a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub product: Product,
    /// Written to the remote store (`false` means kept on this device).
    pub synced: bool,
    /// Message the clerk must see.
    pub alert: Option<String>,
}

const SAVE_DENIED_ALERT: &str =
    "Write access to the database is not enabled. The product is saved on this device for now.";
const SAVE_OFFLINE_ALERT: &str =
    "Could not reach the server. The product is saved on this device (offline mode).";

pub struct Controller<R, B> {
    remote: Option<R>,
    cache: LocalCache<B>,
    health: HealthMonitor,
    state: AppState,
    announcer: Arc<dyn Announcer>,
    bank: Option<BankConfig>,
    events_tx: mpsc::UnboundedSender<FeedEvent>,
    events_rx: mpsc::UnboundedReceiver<FeedEvent>,
    generation: u64,
    subscriptions: Vec<Subscription>,
}

impl<R: RemoteStore, B: CacheBackend> Controller<R, B> {
    /// Build a controller. `remote: None` means no remote store is
    /// configured: the controller runs from the cache for its whole life.
    pub fn new(remote: Option<R>, cache: LocalCache<B>) -> Self {
        let health = if remote.is_some() {
            HealthMonitor::configured(None)
        } else {
            HealthMonitor::config_missing()
        };
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            remote,
            cache,
            health,
            state: AppState::default(),
            announcer: Arc::new(LogAnnouncer),
            bank: None,
            events_tx,
            events_rx,
            generation: 0,
            subscriptions: Vec::new(),
        }
    }

    /// Attach console links shown on degraded banners.
    #[must_use]
    pub fn with_links(mut self, links: RemediationLinks) -> Self {
        if self.remote.is_some() {
            self.health = HealthMonitor::configured(Some(links));
        }
        self
    }

    #[must_use]
    pub fn with_announcer(mut self, announcer: impl Announcer + 'static) -> Self {
        self.announcer = Arc::new(announcer);
        self
    }

    /// Bank account used for transfer QR codes at checkout.
    #[must_use]
    pub fn with_bank(mut self, bank: Option<BankConfig>) -> Self {
        self.bank = bank;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub const fn state(&self) -> &AppState {
        &self.state
    }

    pub const fn health(&self) -> BackendHealth {
        self.health.state()
    }

    pub fn banner(&self) -> Option<Banner> {
        self.health.banner()
    }

    pub fn products(&self) -> &[Product] {
        &self.state.products
    }

    pub fn invoices(&self) -> &[Invoice] {
        &self.state.invoices
    }

    pub const fn is_loading(&self) -> bool {
        self.state.loading
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Subscribe to the remote store, or load the cache if there is none.
    pub fn start(&mut self) {
        if self.remote.is_none() {
            info!("no remote store configured, running from local cache");
            self.state.products = self.cache.load_products();
            self.state.invoices = self.cache.load_invoices();
            self.state.loading = false;
            return;
        }
        self.subscribe();
    }

    /// Tear down every subscription and subscribe again.
    ///
    /// Returns `false` when there is no remote store to retry against.
    pub fn retry(&mut self) -> bool {
        if self.remote.is_none() {
            return false;
        }
        info!(generation = self.generation, "retrying remote subscriptions");
        self.unsubscribe();
        self.subscribe();
        true
    }

    /// Cancel subscriptions. Queued events become stale and are ignored.
    pub fn shutdown(&mut self) {
        self.unsubscribe();
        self.generation += 1;
        debug!("controller shut down");
    }

    fn subscribe(&mut self) {
        let Some(remote) = self.remote.as_ref() else {
            return;
        };
        self.generation += 1;
        for collection in Collection::ALL {
            let sink = FeedSink::new(self.events_tx.clone(), collection, self.generation);
            self.subscriptions.push(remote.subscribe(collection, sink));
        }
        debug!(generation = self.generation, "subscribed");
    }

    fn unsubscribe(&mut self) {
        // Dropping a subscription cancels it
        self.subscriptions.clear();
    }

    // =========================================================================
    // Event intake
    // =========================================================================

    /// Wait for the next feed event.
    ///
    /// Pending forever when there is no remote store.
    pub async fn next_event(&mut self) -> Option<FeedEvent> {
        self.events_rx.recv().await
    }

    /// Apply every event already queued. Returns how many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            applied += 1;
        }
        applied
    }

    /// Apply one feed event.
    pub fn handle_event(&mut self, event: FeedEvent) {
        if event.generation != self.generation {
            debug!(
                collection = %event.collection,
                generation = event.generation,
                current = self.generation,
                "dropping event from a stale subscription"
            );
            return;
        }

        match event.payload {
            FeedPayload::Snapshot(documents) => {
                let non_empty = !documents.is_empty();
                match event.collection {
                    Collection::Products => self.state.products = decode_products(documents),
                    Collection::Invoices => self.state.invoices = decode_invoices(documents),
                }
                self.state.loading = false;
                self.health.record_push(non_empty);
                debug!(
                    collection = %event.collection,
                    products = self.state.products.len(),
                    invoices = self.state.invoices.len(),
                    "snapshot applied"
                );
                self.persist(event.collection);
            }
            FeedPayload::Error(error) => {
                self.state.loading = false;
                self.degrade(&error);
            }
        }
    }

    /// Classify a remote failure into health and run the entry actions.
    fn degrade(&mut self, error: &RemoteError) -> Transition {
        warn!(error = %error, "remote store failure");
        let transition = self.health.record_error(error);
        if transition.entered(DegradedReason::ConnectivityLoss)
            || transition.entered(DegradedReason::DatabaseMissing)
        {
            let (products, invoices) = self
                .state
                .fill_empty(|| self.cache.load_products(), || self.cache.load_invoices());
            if products || invoices {
                info!(products, invoices, "resumed from local cache");
            }
        }
        transition
    }

    /// Write a collection through to the cache unless synced.
    fn persist(&self, collection: Collection) {
        if self.health.state().is_synced() {
            return;
        }
        match collection {
            Collection::Products => self.cache.save_products(&self.state.products),
            Collection::Invoices => self.cache.save_invoices(&self.state.invoices),
        }
    }

    /// Whether writes should go to the remote store right now.
    fn remote_writable(&self) -> Option<&R> {
        self.remote
            .as_ref()
            .filter(|_| self.health.state().is_synced())
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Create or edit a product.
    ///
    /// When synced the remote store is the writer; any remote failure
    /// degrades health and the edit is applied locally instead, so it is
    /// never lost.
    ///
    /// # Errors
    ///
    /// Returns `PosError::InvalidDraft` if the draft fails validation and
    /// `PosError::ProductNotFound` when editing an unknown product.
    pub async fn upsert_product(&mut self, draft: ProductDraft) -> Result<SaveOutcome, PosError> {
        draft.validate()?;
        let existing = match &draft.id {
            Some(id) => Some(
                self.state
                    .product(id)
                    .cloned()
                    .ok_or_else(|| PosError::ProductNotFound(id.clone()))?,
            ),
            None => None,
        };

        if let Some(remote) = self.remote_writable() {
            let result = match &existing {
                Some(product) => {
                    remote
                        .write(Collection::Products, Some(product.id.as_str()), draft_fields(&draft))
                        .await
                }
                None => {
                    let product = draft.clone().into_product(ProductId::new(""))?;
                    remote
                        .write(Collection::Products, None, product_fields(&product))
                        .await
                }
            };

            match result {
                Ok(id) => {
                    let product = self.apply_draft(&draft, existing.as_ref(), ProductId::new(id))?;
                    info!(product = %product.id, "product saved");
                    return Ok(SaveOutcome {
                        product,
                        synced: true,
                        alert: None,
                    });
                }
                Err(error) => {
                    let transition = self.degrade(&error);
                    let alert = match transition.to.reason() {
                        Some(DegradedReason::PermissionDenied) => Some(SAVE_DENIED_ALERT.to_string()),
                        Some(DegradedReason::ConnectivityLoss) => Some(SAVE_OFFLINE_ALERT.to_string()),
                        Some(DegradedReason::DatabaseMissing) | None => None,
                    };
                    return self.save_locally(&draft, existing.as_ref(), alert);
                }
            }
        }

        let alert = (self.health() == BackendHealth::Degraded(DegradedReason::PermissionDenied))
            .then(|| SAVE_DENIED_ALERT.to_string());
        self.save_locally(&draft, existing.as_ref(), alert)
    }

    fn save_locally(
        &mut self,
        draft: &ProductDraft,
        existing: Option<&Product>,
        alert: Option<String>,
    ) -> Result<SaveOutcome, PosError> {
        let id = existing.map_or_else(|| self.fresh_product_id(), |p| p.id.clone());
        let product = self.apply_draft(draft, existing, id)?;
        self.persist(Collection::Products);
        info!(product = %product.id, "product saved on this device");
        Ok(SaveOutcome {
            product,
            synced: false,
            alert,
        })
    }

    /// Merge a draft into memory and return the resulting record.
    fn apply_draft(
        &mut self,
        draft: &ProductDraft,
        existing: Option<&Product>,
        id: ProductId,
    ) -> Result<Product, PosError> {
        let product = match existing {
            Some(existing) => draft.apply_to(existing)?,
            None => draft.clone().into_product(id)?,
        };
        self.state.put_product(product.clone());
        Ok(product)
    }

    /// Timestamp-derived ID not used by any product in memory.
    fn fresh_product_id(&self) -> ProductId {
        let mut at = Utc::now();
        loop {
            let id = ProductId::from_timestamp(at);
            if self.state.product(&id).is_none() {
                return id;
            }
            at += chrono::Duration::milliseconds(1);
        }
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns `PosError::ProductNotFound` for an unknown ID and
    /// `PosError::DeleteDenied` when security rules reject the delete; the
    /// product is kept in that case.
    pub async fn delete_product(&mut self, id: &ProductId) -> Result<(), PosError> {
        if self.state.product(id).is_none() {
            return Err(PosError::ProductNotFound(id.clone()));
        }
        self.delete_remote(Collection::Products, id.as_str()).await?;
        self.state.remove_product(id);
        self.persist(Collection::Products);
        info!(product = %id, "product deleted");
        Ok(())
    }

    /// Delete an invoice. Same rules as [`Self::delete_product`].
    ///
    /// # Errors
    ///
    /// Returns `PosError::InvoiceNotFound` for an unknown ID and
    /// `PosError::DeleteDenied` when security rules reject the delete.
    pub async fn delete_invoice(&mut self, id: &InvoiceId) -> Result<(), PosError> {
        if self.state.invoice(id).is_none() {
            return Err(PosError::InvoiceNotFound(id.clone()));
        }
        self.delete_remote(Collection::Invoices, id.as_str()).await?;
        self.state.remove_invoice(id);
        if self
            .state
            .viewing_invoice
            .as_ref()
            .is_some_and(|i| &i.id == id)
        {
            self.state.viewing_invoice = None;
        }
        self.persist(Collection::Invoices);
        info!(invoice = %id, "invoice deleted");
        Ok(())
    }

    /// Remote half of a delete. `Ok` means the caller should remove the
    /// record locally.
    async fn delete_remote(&mut self, collection: Collection, id: &str) -> Result<(), PosError> {
        let Some(remote) = self.remote.as_ref() else {
            return Ok(());
        };
        // Rules may have been fixed since the denial, so a denied backend
        // still gets asked.
        match self.health.state() {
            BackendHealth::Synced | BackendHealth::Degraded(DegradedReason::PermissionDenied) => {}
            BackendHealth::Degraded(_) | BackendHealth::ConfigMissing => return Ok(()),
        }

        let result = remote.delete(collection, id).await;
        match result {
            Ok(()) => Ok(()),
            // Already gone remotely
            Err(RemoteError::NotFound(detail)) => {
                debug!(collection = %collection, id, detail, "delete of missing document");
                Ok(())
            }
            Err(error @ RemoteError::PermissionDenied(_)) => {
                self.health.record_error(&error);
                let err = PosError::DeleteDenied(error);
                err.capture();
                Err(err)
            }
            Err(error) => {
                self.degrade(&error);
                Ok(())
            }
        }
    }

    // =========================================================================
    // Search
    // =========================================================================

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.state.search_term = term.into();
    }

    /// Products matching the search term, in catalog order.
    pub fn visible_products(&self) -> Vec<&Product> {
        self.state.visible_products()
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Add a product to the cart. Returns the line's new quantity.
    ///
    /// # Errors
    ///
    /// Returns `PosError::ProductNotFound` for an unknown ID.
    pub fn add_to_cart(&mut self, id: &ProductId, quantity: u32) -> Result<u32, PosError> {
        let product = self
            .state
            .product(id)
            .cloned()
            .ok_or_else(|| PosError::ProductNotFound(id.clone()))?;
        Ok(self.state.cart.add(&product, quantity))
    }

    pub fn remove_from_cart(&mut self, id: &ProductId) -> bool {
        self.state.cart.remove(id)
    }

    /// Change a line's quantity by `delta` (never below 1).
    pub fn adjust_cart(&mut self, id: &ProductId, delta: i64) -> Option<u32> {
        self.state.cart.adjust(id, delta)
    }

    pub fn clear_cart(&mut self) {
        self.state.cart.clear();
    }

    pub fn cart_total(&self) -> Decimal {
        self.state.cart.total()
    }

    /// Announce the amount due before a payment method is chosen.
    ///
    /// # Errors
    ///
    /// Returns `PosError::EmptyCart` if there is nothing to pay for.
    pub fn begin_checkout(&self) -> Result<Decimal, PosError> {
        if self.state.cart.is_empty() {
            return Err(PosError::EmptyCart);
        }
        let total = self.state.cart.total();
        self.announcer.announce(&format!(
            "Tổng tiền cần thanh toán là {} đồng. Vui lòng chọn hình thức thanh toán.",
            spoken_amount(total)
        ));
        Ok(total)
    }
}
