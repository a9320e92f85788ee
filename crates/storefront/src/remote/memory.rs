//! In-process remote store.
//!
//! Behaves like the hosted store from the controller's point of view: live
//! subscriptions receive ordered whole-collection snapshots after every
//! change, and batches are all-or-nothing. Failures can be injected either
//! as a persistent outage or as one-shot errors per operation.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use smartshop_core::{Invoice, Product};
use tracing::debug;

use super::conversions::{decode_invoices, decode_products, invoice_fields, product_fields};
use super::{
    Collection, FeedSink, Fields, RemoteDocument, RemoteError, RemoteStore, Subscription, WriteOp,
};

/// Operation kinds that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Subscribe,
    Write,
    Delete,
    BatchCommit,
}

/// Shared in-memory document store. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryRemote {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    products: BTreeMap<String, Fields>,
    invoices: BTreeMap<String, Fields>,
    subscribers: Vec<Subscriber>,
    next_subscriber: u64,
    next_document: u64,
    outage: Option<RemoteError>,
    failures: HashMap<Operation, VecDeque<RemoteError>>,
    calls: HashMap<Operation, usize>,
}

struct Subscriber {
    id: u64,
    sink: FeedSink,
}

impl MemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with products (IDs are kept).
    #[must_use]
    pub fn with_products(products: &[Product]) -> Self {
        let remote = Self::new();
        {
            let mut inner = remote.lock();
            for product in products {
                inner
                    .products
                    .insert(product.id.to_string(), product_fields(product));
            }
        }
        remote
    }

    /// Insert or replace an invoice directly, notifying subscribers.
    pub fn put_invoice(&self, invoice: &Invoice) {
        let mut inner = self.lock();
        inner
            .invoices
            .insert(invoice.id.to_string(), invoice_fields(invoice));
        inner.broadcast(Collection::Invoices);
    }

    /// Fail every operation with `error` until cleared with `None`.
    ///
    /// Live subscriptions receive the error immediately; clearing the outage
    /// pushes fresh snapshots to them.
    pub fn set_outage(&self, error: Option<RemoteError>) {
        let mut inner = self.lock();
        inner.outage.clone_from(&error);
        match error {
            Some(error) => {
                for subscriber in &inner.subscribers {
                    subscriber.sink.error(error.clone());
                }
            }
            None => {
                for collection in Collection::ALL {
                    inner.broadcast(collection);
                }
            }
        }
    }

    /// Fail the next call of `operation` with `error`.
    pub fn fail_next(&self, operation: Operation, error: RemoteError) {
        self.lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Number of calls made for an operation, including failed ones.
    #[must_use]
    pub fn calls(&self, operation: Operation) -> usize {
        self.lock().calls.get(&operation).copied().unwrap_or(0)
    }

    /// Live subscriptions on a collection.
    #[must_use]
    pub fn subscriber_count(&self, collection: Collection) -> usize {
        self.lock()
            .subscribers
            .iter()
            .filter(|s| s.sink.collection() == collection && !s.sink.is_closed())
            .count()
    }

    /// Ordered snapshot of a collection.
    #[must_use]
    pub fn documents(&self, collection: Collection) -> Vec<RemoteDocument> {
        self.lock().snapshot(collection)
    }

    #[must_use]
    pub fn products(&self) -> Vec<Product> {
        decode_products(self.documents(Collection::Products))
    }

    #[must_use]
    pub fn invoices(&self) -> Vec<Invoice> {
        decode_invoices(self.documents(Collection::Invoices))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Inner {
    fn collection(&self, collection: Collection) -> &BTreeMap<String, Fields> {
        match collection {
            Collection::Products => &self.products,
            Collection::Invoices => &self.invoices,
        }
    }

    fn collection_mut(&mut self, collection: Collection) -> &mut BTreeMap<String, Fields> {
        match collection {
            Collection::Products => &mut self.products,
            Collection::Invoices => &mut self.invoices,
        }
    }

    /// Record a call and return the error it should fail with, if any.
    fn check(&mut self, operation: Operation) -> Result<(), RemoteError> {
        *self.calls.entry(operation).or_default() += 1;
        if let Some(error) = self
            .failures
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        match &self.outage {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn snapshot(&self, collection: Collection) -> Vec<RemoteDocument> {
        let order = collection.order();
        let mut documents: Vec<RemoteDocument> = self
            .collection(collection)
            .iter()
            .map(|(id, fields)| RemoteDocument {
                id: id.clone(),
                fields: fields.clone(),
            })
            .collect();
        documents.sort_by(|a, b| {
            let ordering = compare_values(a.fields.get(order.field), b.fields.get(order.field));
            if order.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
        documents
    }

    fn broadcast(&mut self, collection: Collection) {
        self.subscribers.retain(|s| !s.sink.is_closed());
        let snapshot = self.snapshot(collection);
        for subscriber in &self.subscribers {
            if subscriber.sink.collection() == collection {
                subscriber.sink.snapshot(snapshot.clone());
            }
        }
    }

    fn generate_id(&mut self) -> String {
        self.next_document += 1;
        format!("doc-{:04}-{}", self.next_document, uuid::Uuid::new_v4().simple())
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

impl RemoteStore for MemoryRemote {
    fn subscribe(&self, collection: Collection, sink: FeedSink) -> Subscription {
        let mut inner = self.lock();
        match inner.check(Operation::Subscribe) {
            Ok(()) => {
                sink.snapshot(inner.snapshot(collection));
            }
            Err(error) => {
                sink.error(error);
            }
        }

        inner.next_subscriber += 1;
        let id = inner.next_subscriber;
        inner.subscribers.push(Subscriber { id, sink });
        debug!(collection = %collection, subscriber = id, "subscribed");

        let shared = Arc::clone(&self.inner);
        Subscription::new(move || {
            let mut inner = shared.lock().unwrap_or_else(PoisonError::into_inner);
            inner.subscribers.retain(|s| s.id != id);
        })
    }

    async fn write(
        &self,
        collection: Collection,
        id: Option<&str>,
        fields: Fields,
    ) -> Result<String, RemoteError> {
        let mut inner = self.lock();
        inner.check(Operation::Write)?;

        let id = match id {
            Some(id) => {
                let document = inner.collection_mut(collection).get_mut(id).ok_or_else(|| {
                    RemoteError::NotFound(format!("No document to update: {collection}/{id}"))
                })?;
                document.extend(fields);
                id.to_string()
            }
            None => {
                let id = inner.generate_id();
                inner.collection_mut(collection).insert(id.clone(), fields);
                id
            }
        };

        inner.broadcast(collection);
        Ok(id)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        inner.check(Operation::Delete)?;
        inner.collection_mut(collection).remove(id);
        inner.broadcast(collection);
        Ok(())
    }

    async fn batch_commit(&self, ops: Vec<WriteOp>) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        inner.check(Operation::BatchCommit)?;

        // Validate everything before touching any document.
        for op in &ops {
            match op {
                WriteOp::Create { collection, id, .. } => {
                    if inner.collection(*collection).contains_key(id) {
                        return Err(RemoteError::Unknown(format!(
                            "Document already exists: {collection}/{id}"
                        )));
                    }
                }
                WriteOp::Update { collection, id, .. } => {
                    if !inner.collection(*collection).contains_key(id) {
                        return Err(RemoteError::NotFound(format!(
                            "No document to update: {collection}/{id}"
                        )));
                    }
                }
            }
        }

        let mut touched = Vec::new();
        for op in ops {
            let collection = op.collection();
            match op {
                WriteOp::Create { id, fields, .. } => {
                    inner.collection_mut(collection).insert(id, fields);
                }
                WriteOp::Update { id, fields, .. } => {
                    if let Some(document) = inner.collection_mut(collection).get_mut(&id) {
                        document.extend(fields);
                    }
                }
            }
            if !touched.contains(&collection) {
                touched.push(collection);
            }
        }

        for collection in touched {
            inner.broadcast(collection);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use smartshop_core::ProductId;
    use tokio::sync::mpsc;

    use super::*;
    use crate::remote::conversions::stock_fields;
    use crate::remote::{FeedEvent, FeedPayload};

    fn product(id: &str, name: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: name.to_string(),
            price: Decimal::from(1_000),
            category: "Test".to_string(),
            stock: 5,
            unit: "cái".to_string(),
        }
    }

    fn sink(collection: Collection) -> (FeedSink, mpsc::UnboundedReceiver<FeedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (FeedSink::new(tx, collection, 1), rx)
    }

    fn snapshot_names(event: FeedEvent) -> Vec<String> {
        match event.payload {
            FeedPayload::Snapshot(docs) => docs
                .iter()
                .map(|d| d.fields["name"].as_str().unwrap().to_string())
                .collect(),
            FeedPayload::Error(e) => panic!("unexpected error {e}"),
        }
    }

    #[tokio::test]
    async fn test_subscribe_pushes_ordered_snapshot() {
        let remote = MemoryRemote::with_products(&[product("1", "Bánh"), product("2", "Ápple")]);
        let (sink, mut rx) = sink(Collection::Products);
        let _subscription = remote.subscribe(Collection::Products, sink);

        let names = snapshot_names(rx.try_recv().unwrap());
        assert_eq!(names, vec!["Bánh".to_string(), "Ápple".to_string()]);
    }

    #[tokio::test]
    async fn test_write_creates_and_updates() {
        let remote = MemoryRemote::new();
        let id = remote
            .write(Collection::Products, None, product_fields(&product("x", "Trà")))
            .await
            .unwrap();
        remote
            .write(Collection::Products, Some(&id), stock_fields(42))
            .await
            .unwrap();

        let products = remote.products();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id.as_str(), id);
        assert_eq!(products[0].stock, 42);
    }

    #[tokio::test]
    async fn test_update_missing_document_is_not_found() {
        let remote = MemoryRemote::new();
        let err = remote
            .write(Collection::Products, Some("nope"), stock_fields(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let remote = MemoryRemote::with_products(&[product("1", "Bánh")]);
        let ops = vec![
            WriteOp::Update {
                collection: Collection::Products,
                id: "1".to_string(),
                fields: stock_fields(0),
            },
            WriteOp::Update {
                collection: Collection::Products,
                id: "missing".to_string(),
                fields: stock_fields(0),
            },
        ];
        assert!(remote.batch_commit(ops).await.is_err());
        assert_eq!(remote.products()[0].stock, 5);
    }

    #[tokio::test]
    async fn test_cancelled_subscription_stops_receiving() {
        let remote = MemoryRemote::new();
        let (sink, mut rx) = sink(Collection::Products);
        let subscription = remote.subscribe(Collection::Products, sink);
        assert_eq!(remote.subscriber_count(Collection::Products), 1);
        let _ = rx.try_recv();

        subscription.cancel();
        assert_eq!(remote.subscriber_count(Collection::Products), 0);

        remote
            .write(Collection::Products, None, product_fields(&product("x", "Trà")))
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_outage_and_one_shot_failures() {
        let remote = MemoryRemote::new();
        remote.fail_next(
            Operation::Delete,
            RemoteError::PermissionDenied("rules".to_string()),
        );
        assert!(matches!(
            remote.delete(Collection::Products, "1").await,
            Err(RemoteError::PermissionDenied(_))
        ));
        assert!(remote.delete(Collection::Products, "1").await.is_ok());

        let (sink, mut rx) = sink(Collection::Invoices);
        let _subscription = remote.subscribe(Collection::Invoices, sink);
        let _ = rx.try_recv();

        remote.set_outage(Some(RemoteError::ConnectivityLoss("down".to_string())));
        assert!(matches!(
            rx.try_recv().unwrap().payload,
            FeedPayload::Error(RemoteError::ConnectivityLoss(_))
        ));
        assert_eq!(remote.calls(Operation::Delete), 2);
    }
}
