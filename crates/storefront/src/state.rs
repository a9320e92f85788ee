//! In-memory view owned by the controller.

use smartshop_core::{Cart, Invoice, InvoiceId, Product, ProductId};

/// Everything the clerk sees. Mutated only by the controller.
#[derive(Debug, Clone)]
pub struct AppState {
    pub products: Vec<Product>,
    /// Newest first.
    pub invoices: Vec<Invoice>,
    pub cart: Cart,
    pub search_term: String,
    /// Invoice currently open on screen.
    pub viewing_invoice: Option<Invoice>,
    /// Set by checkout, consumed when the invoice is closed.
    pub fresh_checkout: bool,
    /// True until the first push, error, or cache load.
    pub loading: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            products: Vec::new(),
            invoices: Vec::new(),
            cart: Cart::new(),
            search_term: String::new(),
            viewing_invoice: None,
            fresh_checkout: false,
            loading: true,
        }
    }
}

impl AppState {
    #[must_use]
    pub fn product(&self, id: &ProductId) -> Option<&Product> {
        self.products.iter().find(|p| &p.id == id)
    }

    #[must_use]
    pub fn invoice(&self, id: &InvoiceId) -> Option<&Invoice> {
        self.invoices.iter().find(|i| &i.id == id)
    }

    /// Product whose name equals `name`, ignoring case.
    #[must_use]
    pub fn product_named(&self, name: &str) -> Option<&Product> {
        let wanted = name.trim().to_lowercase();
        self.products
            .iter()
            .find(|p| p.name.to_lowercase() == wanted)
    }

    /// Products matching the current search term.
    #[must_use]
    pub fn visible_products(&self) -> Vec<&Product> {
        self.products
            .iter()
            .filter(|p| p.matches(&self.search_term))
            .collect()
    }

    /// Insert or replace a product by ID.
    pub fn put_product(&mut self, product: Product) {
        match self.products.iter_mut().find(|p| p.id == product.id) {
            Some(existing) => *existing = product,
            None => self.products.push(product),
        }
    }

    /// Prepend an invoice, replacing any older copy with the same ID.
    pub fn prepend_invoice(&mut self, invoice: Invoice) {
        self.invoices.retain(|i| i.id != invoice.id);
        self.invoices.insert(0, invoice);
    }

    pub fn remove_product(&mut self, id: &ProductId) -> bool {
        let before = self.products.len();
        self.products.retain(|p| &p.id != id);
        self.products.len() != before
    }

    pub fn remove_invoice(&mut self, id: &InvoiceId) -> bool {
        let before = self.invoices.len();
        self.invoices.retain(|i| &i.id != id);
        self.invoices.len() != before
    }

    /// Fill whichever collections are empty. Returns which were filled.
    pub fn fill_empty(
        &mut self,
        products: impl FnOnce() -> Vec<Product>,
        invoices: impl FnOnce() -> Vec<Invoice>,
    ) -> (bool, bool) {
        let fill_products = self.products.is_empty();
        let fill_invoices = self.invoices.is_empty();
        if fill_products {
            self.products = products();
        }
        if fill_invoices {
            self.invoices = invoices();
        }
        (fill_products, fill_invoices)
    }
}
