//! In-process remote store

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{RemoteDocument, RemoteSnapshot, RemoteStore, Subscription};
use crate::error::{Error, Result};

type Listener = mpsc::UnboundedSender<Result<RemoteSnapshot>>;

/// A remote collection held in memory.
///
/// Every mutation pushes the full collection to all live subscribers, the
/// same way a hosted document store notifies its listeners. Clones share
/// one collection, so two controllers holding clones behave like two
/// devices on one account.
#[derive(Clone, Default)]
pub struct MemoryRemoteStore {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    documents: BTreeMap<String, RemoteDocument>,
    listeners: Vec<Listener>,
    offline: bool,
}

impl MemoryState {
    fn snapshot(&self) -> RemoteSnapshot {
        RemoteSnapshot::new(self.documents.values().cloned().collect())
    }

    fn notify(&mut self) {
        let snapshot = self.snapshot();
        self.listeners
            .retain(|listener| listener.send(Ok(snapshot.clone())).is_ok());
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline {
            Err(Error::Remote("remote store is offline".into()))
        } else {
            Ok(())
        }
    }
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes and deletes fail until switched back
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Current documents, ordered by key
    pub fn documents(&self) -> Vec<RemoteDocument> {
        self.lock().snapshot().documents
    }

    pub fn document(&self, id: &str) -> Option<RemoteDocument> {
        self.lock().documents.get(id).cloned()
    }

    /// Deliver a listener failure to every subscriber
    pub fn push_error(&self, message: &str) {
        self.lock()
            .listeners
            .retain(|listener| listener.send(Err(Error::Remote(message.to_string()))).is_ok());
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn set_document(&self, id: &str, document: &RemoteDocument) -> Result<()> {
        let mut state = self.lock();
        state.ensure_online()?;

        let mut stored = document.clone();
        stored.id = id.to_string();
        state.documents.insert(id.to_string(), stored);
        state.notify();
        Ok(())
    }

    async fn delete_document(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        state.ensure_online()?;

        if state.documents.remove(id).is_some() {
            state.notify();
        }
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        if tx.send(Ok(state.snapshot())).is_ok() {
            state.listeners.push(tx);
        }
        rx
    }
}
