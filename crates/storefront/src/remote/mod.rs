//! Remote document store clients.
//!
//! # Architecture
//!
//! - The remote store is the source of truth while it is reachable
//! - Subscriptions deliver whole-collection snapshots through a [`FeedSink`]
//!   into the controller's single event channel
//! - Every client error is classified into [`RemoteError`] at this boundary;
//!   callers never see transport or wire error shapes
//!
//! # Implementations
//!
//! - [`FirestoreRemote`] - Firestore REST v1 (polling subscriptions)
//! - [`MemoryRemote`] - in-process store with failure injection, used by tests
//!   and local demos

pub mod conversions;
mod error;
mod firestore;
mod memory;

pub use error::{RemoteError, classify};
pub use firestore::FirestoreRemote;
pub use memory::{MemoryRemote, Operation};

use std::future::Future;

use tokio::sync::mpsc;

/// Document fields as loosely typed JSON.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// The two collections the point of sale syncs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Products,
    Invoices,
}

impl Collection {
    pub const ALL: [Self; 2] = [Self::Products, Self::Invoices];

    /// Collection name in the remote store.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Invoices => "invoices",
        }
    }

    /// Ordering applied to subscription snapshots.
    #[must_use]
    pub const fn order(self) -> OrderBy {
        match self {
            Self::Products => OrderBy {
                field: "name",
                descending: false,
            },
            Self::Invoices => OrderBy {
                field: "date",
                descending: true,
            },
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Sort key for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub field: &'static str,
    pub descending: bool,
}

/// A document as delivered by a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDocument {
    pub id: String,
    pub fields: Fields,
}

/// One write inside an all-or-nothing batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create a document with a caller-chosen ID. Fails if it already exists.
    Create {
        collection: Collection,
        id: String,
        fields: Fields,
    },
    /// Overwrite the given fields of an existing document. Fails if missing.
    Update {
        collection: Collection,
        id: String,
        fields: Fields,
    },
}

impl WriteOp {
    #[must_use]
    pub const fn collection(&self) -> Collection {
        match self {
            Self::Create { collection, .. } | Self::Update { collection, .. } => *collection,
        }
    }
}

/// An event produced by a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEvent {
    pub collection: Collection,
    /// Subscription generation this event belongs to.
    pub generation: u64,
    pub payload: FeedPayload,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedPayload {
    /// The full, ordered collection.
    Snapshot(Vec<RemoteDocument>),
    /// The subscription failed.
    Error(RemoteError),
}

/// Sending half handed to [`RemoteStore::subscribe`].
///
/// Tags every event with the collection and subscription generation so the
/// controller can discard events from torn-down subscriptions.
#[derive(Debug, Clone)]
pub struct FeedSink {
    tx: mpsc::UnboundedSender<FeedEvent>,
    collection: Collection,
    generation: u64,
}

impl FeedSink {
    #[must_use]
    pub const fn new(
        tx: mpsc::UnboundedSender<FeedEvent>,
        collection: Collection,
        generation: u64,
    ) -> Self {
        Self {
            tx,
            collection,
            generation,
        }
    }

    #[must_use]
    pub const fn collection(&self) -> Collection {
        self.collection
    }

    /// Deliver a snapshot. Returns `false` once the receiver is gone.
    pub fn snapshot(&self, documents: Vec<RemoteDocument>) -> bool {
        self.send(FeedPayload::Snapshot(documents))
    }

    /// Deliver an error. Returns `false` once the receiver is gone.
    pub fn error(&self, error: RemoteError) -> bool {
        self.send(FeedPayload::Error(error))
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, payload: FeedPayload) -> bool {
        self.tx
            .send(FeedEvent {
                collection: self.collection,
                generation: self.generation,
                payload,
            })
            .is_ok()
    }
}

/// Handle to a live subscription. Cancels on drop.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop receiving events.
    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Primitives the point of sale needs from a remote document store.
///
/// Every method reports failures as a classified [`RemoteError`].
pub trait RemoteStore: Send + Sync {
    /// Start a live subscription on a collection.
    ///
    /// The store pushes the current snapshot, then a new snapshot on every
    /// change, ordered by [`Collection::order`]. Setup failures are delivered
    /// through the sink as error events.
    fn subscribe(&self, collection: Collection, sink: FeedSink) -> Subscription;

    /// Create a document (`id` omitted) or update the given fields of an
    /// existing one. Returns the document ID.
    fn write(
        &self,
        collection: Collection,
        id: Option<&str>,
        fields: Fields,
    ) -> impl Future<Output = Result<String, RemoteError>> + Send;

    /// Delete a document.
    fn delete(
        &self,
        collection: Collection,
        id: &str,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Apply every write or none of them.
    fn batch_commit(
        &self,
        ops: Vec<WriteOp>,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;
}
