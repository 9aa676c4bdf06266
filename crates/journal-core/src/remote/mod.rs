//! Remote document stores mirroring the journal collection

mod document;
mod firestore;
mod memory;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

pub use document::{FieldValue, RemoteDocument, RemoteSnapshot};
pub use firestore::{FirestoreConfig, FirestoreRemoteStore};
pub use memory::MemoryRemoteStore;

/// Push-based stream of collection snapshots.
///
/// The first message is the initial load; every later message is the full
/// collection after a change. Listener failures arrive as `Err` and do not
/// end the stream.
pub type Subscription = mpsc::UnboundedReceiver<Result<RemoteSnapshot>>;

/// A document collection keyed by entry identifier
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create or fully replace the document with key `id`
    async fn set_document(&self, id: &str, document: &RemoteDocument) -> Result<()>;

    /// Delete the document with key `id`; deleting a missing document succeeds
    async fn delete_document(&self, id: &str) -> Result<()>;

    /// Start observing the collection.
    ///
    /// Must be called from within a Tokio runtime. The subscription stays
    /// live until the receiver is dropped.
    fn subscribe(&self) -> Subscription;
}
