//! Two-way synchronization between the local store and a remote collection.
//!
//! Inbound, a listener task drains the remote subscription, decodes each
//! snapshot and hands the entry list to an applier task over a channel; the
//! applier owns the storage handle and reconciles the local table.
//! Outbound, local writes are committed first and then pushed to the remote
//! store from detached tasks whose outcome is logged and broadcast.

mod mapper;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::models::{Entry, EntryId};
use crate::remote::{RemoteDocument, RemoteStore, Subscription};
use crate::services::JournalRepository;
use crate::state::{SyncState, SyncStatus};

pub use mapper::{document_to_entry, entry_to_document, snapshot_to_entries};

const SNAPSHOT_QUEUE_CAPACITY: usize = 8;
const OUTBOUND_EVENT_CAPACITY: usize = 64;

/// How a remote snapshot is applied to the local table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReconcileMode {
    /// Upsert and delete by id, skipping ids whose local write is unconfirmed
    #[default]
    Merge,
    /// Delete every local row and insert the snapshot
    Replace,
}

impl fmt::Display for ReconcileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merge => f.write_str("merge"),
            Self::Replace => f.write_str("replace"),
        }
    }
}

impl FromStr for ReconcileMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "merge" => Ok(Self::Merge),
            "replace" => Ok(Self::Replace),
            other => Err(format!(
                "unknown reconcile mode '{other}' (expected merge or replace)"
            )),
        }
    }
}

/// Options for [`SyncController::start`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    pub reconcile: ReconcileMode,
}

/// Kind of remote write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundOp {
    Put,
    Delete,
}

impl fmt::Display for OutboundOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Put => f.write_str("put"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// Outcome of one fire-and-forget remote write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEvent {
    pub id: EntryId,
    pub op: OutboundOp,
    /// `Err` carries the rendered remote error
    pub outcome: std::result::Result<(), String>,
}

enum RemoteWrite {
    Put(RemoteDocument),
    Delete,
}

impl RemoteWrite {
    const fn op(&self) -> OutboundOp {
        match self {
            Self::Put(_) => OutboundOp::Put,
            Self::Delete => OutboundOp::Delete,
        }
    }
}

/// Snapshots an unconfirmed write stays protected for
const CONFIRM_WINDOW: u32 = 3;

/// Local writes whose ids inbound merges must leave alone.
///
/// An id is protected while its remote write is in flight and afterwards
/// until an applied snapshot agrees with what was written, or until
/// [`CONFIRM_WINDOW`] snapshots have gone by without agreeing. A snapshot
/// fetched before the write landed therefore cannot undo it.
#[derive(Clone, Default)]
struct PendingWrites(Arc<Mutex<PendingInner>>);

#[derive(Default)]
struct PendingInner {
    writes: HashMap<EntryId, PendingWrite>,
    /// Entries of the most recently applied snapshot
    last_snapshot: HashMap<EntryId, Entry>,
}

#[derive(Default)]
struct PendingWrite {
    in_flight: usize,
    awaiting: Option<Confirmation>,
}

struct Confirmation {
    /// What the snapshot should hold for the id; `None` after a delete
    expected: Option<Entry>,
    snapshots_left: u32,
}

impl PendingWrite {
    const fn is_settled(&self) -> bool {
        self.in_flight == 0 && self.awaiting.is_none()
    }
}

impl PendingWrites {
    fn lock(&self) -> MutexGuard<'_, PendingInner> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn acquire(&self, id: EntryId) {
        self.lock().writes.entry(id).or_default().in_flight += 1;
    }

    /// The remote write reached the store; wait for a snapshot showing it
    fn landed(&self, id: EntryId, expected: Option<Entry>) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let confirmed = inner.last_snapshot.get(&id) == expected.as_ref();

        if let Some(write) = inner.writes.get_mut(&id) {
            write.in_flight = write.in_flight.saturating_sub(1);
            write.awaiting = (!confirmed).then_some(Confirmation {
                expected,
                snapshots_left: CONFIRM_WINDOW,
            });
            if write.is_settled() {
                inner.writes.remove(&id);
            }
        }
    }

    /// The remote write failed; nothing will show up remotely
    fn failed(&self, id: EntryId) {
        let mut inner = self.lock();
        if let Some(write) = inner.writes.get_mut(&id) {
            write.in_flight = write.in_flight.saturating_sub(1);
            if write.is_settled() {
                inner.writes.remove(&id);
            }
        }
    }

    /// Record an applied snapshot and release the writes it confirms
    fn observe(&self, entries: &[Entry]) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.last_snapshot = entries
            .iter()
            .filter_map(|entry| entry.id.map(|id| (id, entry.clone())))
            .collect();

        let snapshot = &inner.last_snapshot;
        inner.writes.retain(|id, write| {
            if let Some(confirmation) = write.awaiting.as_mut() {
                confirmation.snapshots_left = confirmation.snapshots_left.saturating_sub(1);
                if snapshot.get(id) == confirmation.expected.as_ref() {
                    write.awaiting = None;
                } else if confirmation.snapshots_left == 0 {
                    tracing::warn!("Remote never confirmed the write of entry {id}; releasing it");
                    write.awaiting = None;
                }
            }
            !write.is_settled()
        });
    }

    fn ids(&self) -> HashSet<EntryId> {
        self.lock().writes.keys().copied().collect()
    }

    fn len(&self) -> usize {
        self.lock().writes.len()
    }
}

/// Keeps the local store in step with a remote collection.
///
/// Lives from [`SyncController::start`] until [`SyncController::shutdown`]
/// (or until dropped, which stops the listener). Must be started inside a
/// Tokio runtime.
pub struct SyncController {
    repository: JournalRepository,
    remote: Arc<dyn RemoteStore>,
    pending: PendingWrites,
    /// Serializes local writes with inbound applies
    write_gate: Arc<tokio::sync::Mutex<()>>,
    outbound: Mutex<Vec<JoinHandle<()>>>,
    events_tx: broadcast::Sender<OutboundEvent>,
    status_rx: watch::Receiver<SyncStatus>,
    shutdown_tx: watch::Sender<bool>,
    listener: JoinHandle<()>,
    applier: JoinHandle<()>,
}

impl SyncController {
    /// Subscribe to `remote` and start applying its snapshots to `repository`
    pub fn start(
        repository: JournalRepository,
        remote: Arc<dyn RemoteStore>,
        options: SyncOptions,
    ) -> Self {
        let pending = PendingWrites::default();
        let write_gate = Arc::new(tokio::sync::Mutex::new(()));
        let (events_tx, _) = broadcast::channel(OUTBOUND_EVENT_CAPACITY);
        let (status_tx, status_rx) = watch::channel(SyncStatus::default());
        let status_tx = Arc::new(status_tx);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (snapshot_tx, snapshot_rx) = mpsc::channel(SNAPSHOT_QUEUE_CAPACITY);

        let listener = tokio::spawn(run_listener(
            remote.subscribe(),
            snapshot_tx,
            shutdown_rx,
            Arc::clone(&status_tx),
        ));
        let applier = tokio::spawn(run_applier(
            snapshot_rx,
            Applier {
                repository: repository.clone(),
                pending: pending.clone(),
                write_gate: Arc::clone(&write_gate),
                mode: options.reconcile,
                status: status_tx,
            },
        ));

        tracing::info!("Sync controller started ({} reconcile)", options.reconcile);

        Self {
            repository,
            remote,
            pending,
            write_gate,
            outbound: Mutex::new(Vec::new()),
            events_tx,
            status_rx,
            shutdown_tx,
            listener,
            applier,
        }
    }

    pub const fn repository(&self) -> &JournalRepository {
        &self.repository
    }

    /// Live view of all local entries, newest date first
    pub fn entries(&self) -> watch::Receiver<Vec<Entry>> {
        self.repository.entries()
    }

    pub async fn get_entry(&self, id: EntryId) -> Result<Option<Entry>> {
        self.repository.get(id).await
    }

    /// Inbound progress
    pub fn status(&self) -> watch::Receiver<SyncStatus> {
        self.status_rx.clone()
    }

    /// Outcomes of outbound writes started after this call
    pub fn outbound_events(&self) -> broadcast::Receiver<OutboundEvent> {
        self.events_tx.subscribe()
    }

    /// Number of entries inbound merges currently leave alone: a remote
    /// write is in flight or no snapshot has shown it yet
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// Save a new entry locally, then push it to the remote store.
    ///
    /// Returns once the local insert is committed; the remote write runs on
    /// its own.
    pub async fn add_entry(&self, entry: &Entry) -> Result<Entry> {
        let _gate = self.write_gate.lock().await;
        let saved = self.repository.insert(entry).await?;
        if let Some(id) = saved.id {
            self.push_remote(id, RemoteWrite::Put(entry_to_document(&saved, id)));
        }
        Ok(saved)
    }

    /// Save an edit locally, then push it to the remote store.
    ///
    /// An entry without an id is logged and skipped. An entry missing from
    /// the local table is still pushed.
    pub async fn update_entry(&self, entry: &Entry) -> Result<()> {
        let Some(id) = entry.id else {
            tracing::error!("Entry '{}' has no id; update skipped", entry.title);
            return Ok(());
        };

        let _gate = self.write_gate.lock().await;
        match self.repository.update(entry).await {
            Ok(_) => {}
            Err(Error::NotFound(_)) => {
                tracing::warn!("Entry {id} is not stored locally; pushing the update anyway");
            }
            Err(error) => return Err(error),
        }
        self.push_remote(id, RemoteWrite::Put(entry_to_document(entry, id)));
        Ok(())
    }

    /// Delete an entry locally, then delete its remote document.
    ///
    /// An entry without an id is logged and skipped. The remote document is
    /// deleted even when the local row is already gone.
    pub async fn delete_entry(&self, entry: &Entry) -> Result<()> {
        let Some(id) = entry.id else {
            tracing::error!("Entry '{}' has no id; delete skipped", entry.title);
            return Ok(());
        };

        let _gate = self.write_gate.lock().await;
        match self.repository.delete(id).await {
            Ok(()) => {}
            Err(Error::NotFound(_)) => {
                tracing::warn!("Entry {id} is not stored locally; deleting it remotely anyway");
            }
            Err(error) => return Err(error),
        }
        self.push_remote(id, RemoteWrite::Delete);
        Ok(())
    }

    /// Wait for every remote write started so far to finish
    pub async fn flush(&self) {
        let handles = std::mem::take(&mut *self.lock_outbound());
        for handle in handles {
            if let Err(error) = handle.await {
                tracing::error!("Outbound write task failed: {error}");
            }
        }
    }

    /// Drain outbound writes, then stop the listener and applier
    pub async fn shutdown(self) {
        self.flush().await;
        let _ = self.shutdown_tx.send(true);

        for (name, handle) in [("listener", self.listener), ("applier", self.applier)] {
            if let Err(error) = handle.await {
                tracing::error!("Sync {name} task failed: {error}");
            }
        }
        tracing::info!("Sync controller stopped");
    }

    fn push_remote(&self, id: EntryId, write: RemoteWrite) {
        self.pending.acquire(id);

        let remote = Arc::clone(&self.remote);
        let pending = self.pending.clone();
        let events_tx = self.events_tx.clone();

        let handle = tokio::spawn(async move {
            let op = write.op();
            let key = id.to_string();
            let (result, expected) = match &write {
                RemoteWrite::Put(document) => (
                    remote.set_document(&key, document).await,
                    document_to_entry(document),
                ),
                RemoteWrite::Delete => (remote.delete_document(&key).await, None),
            };

            let outcome = match result {
                Ok(()) => {
                    tracing::debug!("Remote {op} of entry {id} succeeded");
                    pending.landed(id, expected);
                    Ok(())
                }
                Err(error) => {
                    tracing::error!("Remote {op} of entry {id} failed: {error}");
                    pending.failed(id);
                    Err(error.to_string())
                }
            };
            // Nobody listening is fine
            let _ = events_tx.send(OutboundEvent { id, op, outcome });
        });

        let mut outbound = self.lock_outbound();
        outbound.retain(|handle| !handle.is_finished());
        outbound.push(handle);
    }

    fn lock_outbound(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run_listener(
    mut subscription: Subscription,
    snapshots: mpsc::Sender<Vec<Entry>>,
    mut shutdown: watch::Receiver<bool>,
    status: Arc<watch::Sender<SyncStatus>>,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown.changed() => break,
            event = subscription.recv() => event,
        };

        match event {
            None => {
                tracing::warn!("Remote subscription closed");
                break;
            }
            Some(Err(error)) => {
                tracing::error!("Remote listen failed: {error}");
                status.send_modify(|status| status.state = SyncState::Error);
            }
            Some(Ok(snapshot)) => {
                let entries = snapshot_to_entries(&snapshot);
                tracing::debug!(
                    "Remote snapshot with {} documents, {} usable",
                    snapshot.len(),
                    entries.len()
                );
                if snapshots.send(entries).await.is_err() {
                    break;
                }
            }
        }
    }
}

struct Applier {
    repository: JournalRepository,
    pending: PendingWrites,
    write_gate: Arc<tokio::sync::Mutex<()>>,
    mode: ReconcileMode,
    status: Arc<watch::Sender<SyncStatus>>,
}

impl Applier {
    async fn apply(&self, entries: &[Entry]) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        match self.mode {
            ReconcileMode::Replace => {
                let count = self.repository.replace_all(entries).await?;
                tracing::info!("Replaced local journal with {count} remote entries");
            }
            ReconcileMode::Merge => {
                let summary = self
                    .repository
                    .merge_snapshot(entries, &self.pending.ids())
                    .await?;
                tracing::info!(
                    "Merged remote snapshot: {} upserted, {} deleted, {} unchanged, {} pending",
                    summary.upserted,
                    summary.deleted,
                    summary.unchanged,
                    summary.skipped
                );
            }
        }
        self.pending.observe(entries);
        Ok(())
    }
}

async fn run_applier(mut snapshots: mpsc::Receiver<Vec<Entry>>, applier: Applier) {
    while let Some(entries) = snapshots.recv().await {
        match applier.apply(&entries).await {
            Ok(()) => applier.status.send_modify(|status| {
                status.state = SyncState::Synced;
                status.snapshots_applied += 1;
                status.last_snapshot_len = entries.len();
            }),
            Err(error) => {
                tracing::error!("Failed to apply remote snapshot: {error}");
                applier
                    .status
                    .send_modify(|status| status.state = SyncState::Error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinates, Mood};
    use crate::remote::{MemoryRemoteStore, RemoteSnapshot};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    async fn wait_for_snapshots(controller: &SyncController, count: u64) {
        let mut status = controller.status();
        tokio::time::timeout(
            Duration::from_secs(5),
            status.wait_for(|status| status.snapshots_applied >= count),
        )
        .await
        .expect("timed out waiting for snapshot")
        .expect("status channel closed");
    }

    async fn start(
        remote: Arc<dyn RemoteStore>,
        reconcile: ReconcileMode,
    ) -> SyncController {
        let repository = JournalRepository::open_in_memory().await.unwrap();
        SyncController::start(repository, remote, SyncOptions { reconcile })
    }

    async fn seed(remote: &MemoryRemoteStore, id: &str, title: Option<&str>) {
        let mut document = RemoteDocument::new(id)
            .with_field("content", format!("content {id}"))
            .with_field("date", "2024-03-01");
        if let Some(title) = title {
            document = document.with_field("title", title);
        }
        remote.set_document(id, &document).await.unwrap();
    }

    /// Remote whose writes wait for a permit before landing
    struct GatedRemote {
        inner: MemoryRemoteStore,
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl RemoteStore for GatedRemote {
        async fn set_document(&self, id: &str, document: &RemoteDocument) -> Result<()> {
            self.gate.acquire().await.expect("gate closed").forget();
            self.inner.set_document(id, document).await
        }

        async fn delete_document(&self, id: &str) -> Result<()> {
            self.gate.acquire().await.expect("gate closed").forget();
            self.inner.delete_document(id).await
        }

        fn subscribe(&self) -> Subscription {
            self.inner.subscribe()
        }
    }

    /// Remote whose snapshots are sent by the test instead of following its writes
    struct ScriptedRemote {
        inner: MemoryRemoteStore,
        subscription: Mutex<Option<Subscription>>,
    }

    impl ScriptedRemote {
        fn new() -> (Self, mpsc::UnboundedSender<Result<RemoteSnapshot>>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let remote = Self {
                inner: MemoryRemoteStore::new(),
                subscription: Mutex::new(Some(rx)),
            };
            (remote, tx)
        }
    }

    #[async_trait]
    impl RemoteStore for ScriptedRemote {
        async fn set_document(&self, id: &str, document: &RemoteDocument) -> Result<()> {
            self.inner.set_document(id, document).await
        }

        async fn delete_document(&self, id: &str) -> Result<()> {
            self.inner.delete_document(id).await
        }

        fn subscribe(&self) -> Subscription {
            self.subscription
                .lock()
                .unwrap()
                .take()
                .expect("subscribed twice")
        }
    }

    fn snapshot_of(entries: &[Entry]) -> RemoteSnapshot {
        RemoteSnapshot::new(
            entries
                .iter()
                .map(|entry| entry_to_document(entry, entry.id.unwrap()))
                .collect(),
        )
    }

    #[test]
    fn reconcile_mode_parses() {
        assert_eq!("merge".parse::<ReconcileMode>(), Ok(ReconcileMode::Merge));
        assert_eq!(" Replace ".parse::<ReconcileMode>(), Ok(ReconcileMode::Replace));
        assert!("diff".parse::<ReconcileMode>().is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn initial_snapshot_drops_malformed_documents() {
        let remote = MemoryRemoteStore::new();
        remote
            .set_document(
                "1",
                &RemoteDocument::new("1")
                    .with_field("title", "A")
                    .with_field("location", "1.5,2.5"),
            )
            .await
            .unwrap();
        remote
            .set_document("x", &RemoteDocument::new("x").with_field("title", "B"))
            .await
            .unwrap();

        let controller = start(Arc::new(remote), ReconcileMode::Merge).await;
        wait_for_snapshots(&controller, 1).await;

        let entries = controller.repository().list().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, Some(EntryId::new(1)));
        assert_eq!(entries[0].coordinates(), Some(Coordinates::new(1.5, 2.5)));
        assert_eq!(controller.status().borrow().last_snapshot_len, 1);

        controller.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn untitled_document_is_excluded_but_others_kept() {
        let remote = MemoryRemoteStore::new();
        seed(&remote, "1", Some("first")).await;
        seed(&remote, "2", None).await;
        seed(&remote, "3", Some("third")).await;

        let controller = start(Arc::new(remote), ReconcileMode::Merge).await;
        wait_for_snapshots(&controller, 1).await;

        let titles = controller
            .repository()
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.title)
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["third", "first"]);

        controller.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rebuild_count_matches_valid_documents_in_both_modes() {
        for mode in [ReconcileMode::Replace, ReconcileMode::Merge] {
            let remote = MemoryRemoteStore::new();
            seed(&remote, "1", Some("a")).await;
            seed(&remote, "2", Some("b")).await;
            seed(&remote, "oops", Some("c")).await;

            let repository = JournalRepository::open_in_memory().await.unwrap();
            repository
                .insert(&Entry::new("stale local", "x", "2020-01-01").with_id(EntryId::new(40)))
                .await
                .unwrap();

            let controller =
                SyncController::start(repository, Arc::new(remote), SyncOptions { reconcile: mode });
            wait_for_snapshots(&controller, 1).await;

            assert_eq!(controller.repository().count().await.unwrap(), 2, "{mode}");
            controller.shutdown().await;
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn add_entry_writes_locally_and_pushes_remote() {
        let remote = MemoryRemoteStore::new();
        let controller = start(Arc::new(remote.clone()), ReconcileMode::Merge).await;
        wait_for_snapshots(&controller, 1).await;

        let saved = controller
            .add_entry(
                &Entry::new("Dinner", "Noodles", "2024-04-02")
                    .with_mood(Mood::Good)
                    .with_location("3.1,101.7"),
            )
            .await
            .unwrap();
        let id = saved.id.unwrap();
        assert_eq!(controller.get_entry(id).await.unwrap(), Some(saved.clone()));

        controller.flush().await;
        let document = remote.document(&id.to_string()).unwrap();
        assert_eq!(document_to_entry(&document), Some(saved.clone()));

        wait_for_snapshots(&controller, 2).await;
        assert_eq!(controller.repository().list().await.unwrap(), vec![saved]);

        controller.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_and_delete_propagate() {
        let remote = MemoryRemoteStore::new();
        let controller = start(Arc::new(remote.clone()), ReconcileMode::Merge).await;
        wait_for_snapshots(&controller, 1).await;

        let mut entry = controller
            .add_entry(&Entry::new("Draft", "first pass", "2024-04-03"))
            .await
            .unwrap();
        let key = entry.id.unwrap().to_string();

        entry.title = "Final".to_string();
        entry.content = "second pass".to_string();
        controller.update_entry(&entry).await.unwrap();
        controller.flush().await;
        assert_eq!(remote.document(&key).unwrap().get_string("title"), Some("Final"));

        controller.delete_entry(&entry).await.unwrap();
        assert!(controller.repository().list().await.unwrap().is_empty());
        controller.flush().await;
        assert!(remote.document(&key).is_none());

        controller.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_id_skips_update_and_delete() {
        let remote = MemoryRemoteStore::new();
        let controller = start(Arc::new(remote.clone()), ReconcileMode::Merge).await;
        let mut events = controller.outbound_events();

        let unsaved = Entry::new("No id", "body", "2024-01-01");
        controller.update_entry(&unsaved).await.unwrap();
        controller.delete_entry(&unsaved).await.unwrap();
        controller.flush().await;

        assert_eq!(controller.pending_writes(), 0);
        assert!(events.try_recv().is_err());
        assert!(remote.documents().is_empty());

        controller.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_remote_write_is_reported_not_returned() {
        let remote = MemoryRemoteStore::new();
        let controller = start(Arc::new(remote.clone()), ReconcileMode::Merge).await;
        wait_for_snapshots(&controller, 1).await;
        let mut events = controller.outbound_events();

        remote.set_offline(true);
        let saved = controller
            .add_entry(&Entry::new("Offline", "body", "2024-05-05"))
            .await
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.id, saved.id.unwrap());
        assert_eq!(event.op, OutboundOp::Put);
        assert!(event.outcome.is_err());

        assert_eq!(controller.repository().count().await.unwrap(), 1);
        assert!(remote.documents().is_empty());

        controller.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn changes_from_another_device_arrive() {
        let remote = MemoryRemoteStore::new();
        let phone = start(Arc::new(remote.clone()), ReconcileMode::Merge).await;
        let tablet = start(Arc::new(remote.clone()), ReconcileMode::Merge).await;
        wait_for_snapshots(&tablet, 1).await;

        let saved = phone
            .add_entry(&Entry::new("From phone", "hello", "2024-08-08"))
            .await
            .unwrap();
        phone.flush().await;

        wait_for_snapshots(&tablet, 2).await;
        assert_eq!(tablet.repository().list().await.unwrap(), vec![saved]);

        phone.shutdown().await;
        tablet.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn merge_keeps_local_write_still_in_flight() {
        let inner = MemoryRemoteStore::new();
        let gate = Arc::new(Semaphore::new(0));
        let remote = GatedRemote {
            inner: inner.clone(),
            gate: Arc::clone(&gate),
        };
        let controller = start(Arc::new(remote), ReconcileMode::Merge).await;
        wait_for_snapshots(&controller, 1).await;

        let saved = controller
            .add_entry(&Entry::new("Unsynced", "body", "2024-09-01"))
            .await
            .unwrap();
        assert_eq!(controller.pending_writes(), 1);

        // Another device writes while ours is still blocked
        seed(&inner, "100", Some("Other device")).await;
        wait_for_snapshots(&controller, 2).await;
        assert_eq!(controller.repository().count().await.unwrap(), 2);
        assert_eq!(
            controller.get_entry(saved.id.unwrap()).await.unwrap(),
            Some(saved.clone())
        );

        gate.add_permits(1);
        controller.flush().await;
        wait_for_snapshots(&controller, 3).await;
        assert_eq!(controller.pending_writes(), 0);
        assert_eq!(controller.repository().count().await.unwrap(), 2);

        controller.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn replace_discards_local_write_still_in_flight() {
        let inner = MemoryRemoteStore::new();
        let gate = Arc::new(Semaphore::new(0));
        let remote = GatedRemote {
            inner: inner.clone(),
            gate: Arc::clone(&gate),
        };
        let controller = start(Arc::new(remote), ReconcileMode::Replace).await;
        wait_for_snapshots(&controller, 1).await;

        let saved = controller
            .add_entry(&Entry::new("Unsynced", "body", "2024-09-01"))
            .await
            .unwrap();

        seed(&inner, "100", Some("Other device")).await;
        wait_for_snapshots(&controller, 2).await;
        assert_eq!(controller.get_entry(saved.id.unwrap()).await.unwrap(), None);

        gate.add_permits(1);
        controller.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn listener_error_sets_error_state_and_keeps_listening() {
        let remote = MemoryRemoteStore::new();
        let controller = start(Arc::new(remote.clone()), ReconcileMode::Merge).await;
        wait_for_snapshots(&controller, 1).await;

        remote.push_error("permission denied");
        let mut status = controller.status();
        tokio::time::timeout(
            Duration::from_secs(5),
            status.wait_for(|status| status.state == SyncState::Error),
        )
        .await
        .unwrap()
        .unwrap();

        seed(&remote, "5", Some("after error")).await;
        wait_for_snapshots(&controller, 2).await;
        assert_eq!(controller.status().borrow().state, SyncState::Synced);
        assert_eq!(controller.repository().count().await.unwrap(), 1);

        controller.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_and_delete_reach_remote_when_local_row_is_missing() {
        let (remote, snapshots) = ScriptedRemote::new();
        let store = remote.inner.clone();
        let first = Entry::new("A", "a", "2024-02-01").with_id(EntryId::new(1));
        let second = Entry::new("B", "b", "2024-02-02").with_id(EntryId::new(2));
        store
            .set_document("1", &entry_to_document(&first, EntryId::new(1)))
            .await
            .unwrap();
        store
            .set_document("2", &entry_to_document(&second, EntryId::new(2)))
            .await
            .unwrap();

        let controller = start(Arc::new(remote), ReconcileMode::Merge).await;
        snapshots
            .send(Ok(snapshot_of(&[first.clone(), second.clone()])))
            .unwrap();
        wait_for_snapshots(&controller, 1).await;

        // Local rows vanish before the edits are saved
        controller.repository().delete(EntryId::new(1)).await.unwrap();
        controller.repository().delete(EntryId::new(2)).await.unwrap();

        let mut edited = first.clone();
        edited.title = "A edited".to_string();
        controller.update_entry(&edited).await.unwrap();
        controller.delete_entry(&second).await.unwrap();
        controller.flush().await;

        assert_eq!(
            store.document("1").and_then(|document| document_to_entry(&document)),
            Some(edited)
        );
        assert!(store.document("2").is_none());

        controller.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stale_snapshot_does_not_resurrect_deleted_entry() {
        let (remote, snapshots) = ScriptedRemote::new();
        let entry = Entry::new("Gone", "body", "2024-06-01").with_id(EntryId::new(7));
        let controller = start(Arc::new(remote), ReconcileMode::Merge).await;
        snapshots.send(Ok(snapshot_of(&[entry.clone()]))).unwrap();
        wait_for_snapshots(&controller, 1).await;
        assert_eq!(controller.repository().count().await.unwrap(), 1);

        controller.delete_entry(&entry).await.unwrap();
        controller.flush().await;
        assert_eq!(controller.pending_writes(), 1);

        // Fetched before the delete landed
        snapshots.send(Ok(snapshot_of(&[entry.clone()]))).unwrap();
        wait_for_snapshots(&controller, 2).await;
        assert_eq!(controller.get_entry(EntryId::new(7)).await.unwrap(), None);
        assert_eq!(controller.pending_writes(), 1);

        snapshots.send(Ok(snapshot_of(&[]))).unwrap();
        wait_for_snapshots(&controller, 3).await;
        assert_eq!(controller.pending_writes(), 0);
        assert_eq!(controller.repository().count().await.unwrap(), 0);

        controller.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stale_snapshot_does_not_remove_added_entry() {
        let (remote, snapshots) = ScriptedRemote::new();
        let controller = start(Arc::new(remote), ReconcileMode::Merge).await;
        snapshots.send(Ok(snapshot_of(&[]))).unwrap();
        wait_for_snapshots(&controller, 1).await;

        let saved = controller
            .add_entry(&Entry::new("Fresh", "body", "2024-06-02"))
            .await
            .unwrap();
        controller.flush().await;

        snapshots.send(Ok(snapshot_of(&[]))).unwrap();
        wait_for_snapshots(&controller, 2).await;
        assert_eq!(controller.get_entry(saved.id.unwrap()).await.unwrap(), Some(saved.clone()));
        assert_eq!(controller.pending_writes(), 1);

        snapshots.send(Ok(snapshot_of(&[saved.clone()]))).unwrap();
        wait_for_snapshots(&controller, 3).await;
        assert_eq!(controller.pending_writes(), 0);
        assert_eq!(controller.repository().list().await.unwrap(), vec![saved]);

        controller.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unconfirmed_write_is_released_after_window() {
        let (remote, snapshots) = ScriptedRemote::new();
        let controller = start(Arc::new(remote), ReconcileMode::Merge).await;
        snapshots.send(Ok(snapshot_of(&[]))).unwrap();
        wait_for_snapshots(&controller, 1).await;

        let saved = controller
            .add_entry(&Entry::new("Lost", "body", "2024-06-03"))
            .await
            .unwrap();
        controller.flush().await;

        for applied in 2..=u64::from(CONFIRM_WINDOW) {
            snapshots.send(Ok(snapshot_of(&[]))).unwrap();
            wait_for_snapshots(&controller, applied).await;
            assert_eq!(controller.pending_writes(), 1);
        }

        let last = u64::from(CONFIRM_WINDOW) + 1;
        snapshots.send(Ok(snapshot_of(&[]))).unwrap();
        wait_for_snapshots(&controller, last).await;
        assert_eq!(controller.pending_writes(), 0);
        assert!(controller.get_entry(saved.id.unwrap()).await.unwrap().is_some());

        // From here on the remote view wins again
        snapshots.send(Ok(snapshot_of(&[]))).unwrap();
        wait_for_snapshots(&controller, last + 1).await;
        assert_eq!(controller.repository().count().await.unwrap(), 0);

        controller.shutdown().await;
    }
}
