//! Checkout: cart in, invoice plus stock decrement out.
//!
//! A checkout is planned once, then committed either as one remote batch or
//! replayed locally. Both paths apply the same plan, so the clerk sees the
//! same invoice and stock whichever path won.

use chrono::{DateTime, Utc};
use smartshop_core::{Invoice, InvoiceId, PaymentMethod, ProductId};
use tracing::info;
use url::Url;

use super::Controller;
use crate::announce::spoken_amount;
use crate::cache::CacheBackend;
use crate::error::PosError;
use crate::health::{BackendHealth, DegradedReason};
use crate::payment::transfer_qr_url;
use crate::remote::conversions::{invoice_fields, stock_fields};
use crate::remote::{Collection, RemoteStore, WriteOp};
use crate::state::AppState;

const CHECKOUT_DENIED_ALERT: &str = "Access error: the invoice could not be saved to the server. Check the database rules. The invoice is kept on this device.";
const CHECKOUT_OFFLINE_ALERT: &str =
    "Could not save to the server. The invoice is kept on this device for now.";

/// New stock level for one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockChange {
    pub product: ProductId,
    pub before: u32,
    pub after: u32,
    /// Still in the product list. Unlisted products have no document to
    /// update and are left out of the batch.
    pub listed: bool,
}

/// Everything a checkout will write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutPlan {
    pub invoice: Invoice,
    pub stock: Vec<StockChange>,
}

impl CheckoutPlan {
    /// Plan a checkout of the current cart.
    ///
    /// Stock is taken from the live product list, falling back to the cart
    /// snapshot for products no longer listed, and never drops below zero.
    ///
    /// # Errors
    ///
    /// Returns `PosError::EmptyCart` if the cart has no lines.
    pub fn prepare(
        state: &AppState,
        method: PaymentMethod,
        at: DateTime<Utc>,
    ) -> Result<Self, PosError> {
        let items = state.cart.items().to_vec();
        let invoice = Invoice::commit(items, method, at).map_err(|_| PosError::EmptyCart)?;
        let stock = invoice
            .items
            .iter()
            .map(|item| {
                let live = state.product(item.id());
                let before = live.map_or(item.product.stock, |p| p.stock);
                StockChange {
                    product: item.id().clone(),
                    before,
                    after: before.saturating_sub(item.quantity),
                    listed: live.is_some(),
                }
            })
            .collect();
        Ok(Self { invoice, stock })
    }

    /// The all-or-nothing batch: create the invoice, set each listed
    /// product's stock level.
    #[must_use]
    pub fn write_ops(&self) -> Vec<WriteOp> {
        let mut ops = Vec::with_capacity(self.stock.len() + 1);
        ops.push(WriteOp::Create {
            collection: Collection::Invoices,
            id: self.invoice.id.to_string(),
            fields: invoice_fields(&self.invoice),
        });
        ops.extend(
            self.stock
                .iter()
                .filter(|change| change.listed)
                .map(|change| WriteOp::Update {
                    collection: Collection::Products,
                    id: change.product.to_string(),
                    fields: stock_fields(change.after),
                }),
        );
        ops
    }
}

/// Which writer committed a checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitPath {
    Remote,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutReceipt {
    pub invoice: Invoice,
    pub path: CommitPath,
    /// Blocking message for the clerk, if any.
    pub alert: Option<String>,
    /// VietQR image for transfer payments when a bank account is configured.
    pub transfer_qr: Option<Url>,
}

impl<R: RemoteStore, B: CacheBackend> Controller<R, B> {
    /// Commit the cart as an invoice paid with `method`.
    ///
    /// When synced the invoice and stock levels go out as one batch. If the
    /// batch fails, health is updated and the same plan is applied locally.
    /// Either way the cart is cleared, the invoice is opened, and the total
    /// is announced.
    ///
    /// # Errors
    ///
    /// Returns `PosError::EmptyCart` if the cart has no lines.
    pub async fn checkout(&mut self, method: PaymentMethod) -> Result<CheckoutReceipt, PosError> {
        let plan = CheckoutPlan::prepare(&self.state, method, self.unused_invoice_instant())?;

        let remote_result = match self.remote_writable() {
            Some(remote) => Some(remote.batch_commit(plan.write_ops()).await),
            None => None,
        };

        let (path, alert) = match remote_result {
            Some(Ok(())) => (CommitPath::Remote, None),
            Some(Err(error)) => {
                let transition = self.degrade(&error);
                let alert = match transition.to.reason() {
                    Some(DegradedReason::PermissionDenied) => Some(CHECKOUT_DENIED_ALERT.to_string()),
                    Some(DegradedReason::ConnectivityLoss) => Some(CHECKOUT_OFFLINE_ALERT.to_string()),
                    Some(DegradedReason::DatabaseMissing) | None => None,
                };
                (CommitPath::Local, alert)
            }
            None => {
                let alert = (self.health() == BackendHealth::Degraded(DegradedReason::PermissionDenied))
                    .then(|| CHECKOUT_DENIED_ALERT.to_string());
                (CommitPath::Local, alert)
            }
        };

        self.apply_plan(&plan);

        let invoice = plan.invoice;
        self.state.cart.clear();
        self.state.viewing_invoice = Some(invoice.clone());
        self.state.fresh_checkout = true;
        self.announcer.announce(&format!(
            "Hóa đơn {}. Tổng tiền {} đồng.",
            invoice.id,
            spoken_amount(invoice.total)
        ));
        info!(
            invoice = %invoice.id,
            total = %invoice.total,
            method = %invoice.payment_method,
            path = ?path,
            "checkout committed"
        );

        let transfer_qr = match (invoice.payment_method, self.bank.as_ref()) {
            (PaymentMethod::Transfer, Some(bank)) => transfer_qr_url(bank, invoice.total),
            _ => None,
        };

        Ok(CheckoutReceipt {
            invoice,
            path,
            alert,
            transfer_qr,
        })
    }

    /// Apply a plan to memory, writing through to the cache when not synced.
    fn apply_plan(&mut self, plan: &CheckoutPlan) {
        for change in &plan.stock {
            if let Some(product) = self
                .state
                .products
                .iter_mut()
                .find(|p| p.id == change.product)
            {
                product.stock = change.after;
            }
        }
        self.state.prepend_invoice(plan.invoice.clone());
        self.persist(Collection::Products);
        self.persist(Collection::Invoices);
    }

    /// Current time, nudged forward until its receipt number is unused.
    fn unused_invoice_instant(&self) -> DateTime<Utc> {
        let mut at = Utc::now();
        while self.state.invoice(&InvoiceId::from_timestamp(at)).is_some() {
            at += chrono::Duration::milliseconds(1);
        }
        at
    }

    /// Close the open invoice.
    ///
    /// Returns `true` when it was a fresh checkout, in which case success is
    /// announced.
    pub fn close_invoice(&mut self) -> bool {
        self.state.viewing_invoice = None;
        if !self.state.fresh_checkout {
            return false;
        }
        self.state.fresh_checkout = false;
        self.announcer.announce("Thanh toán thành công");
        true
    }

    /// Open a past invoice.
    ///
    /// # Errors
    ///
    /// Returns `PosError::InvoiceNotFound` for an unknown ID.
    pub fn view_invoice(&mut self, id: &InvoiceId) -> Result<&Invoice, PosError> {
        let invoice = self
            .state
            .invoice(id)
            .cloned()
            .ok_or_else(|| PosError::InvoiceNotFound(id.clone()))?;
        self.state.fresh_checkout = false;
        Ok(self.state.viewing_invoice.insert(invoice))
    }
}
