//! Thread-safe journal repository with a published entry list.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::db::{Database, LibSqlEntryRepository, MergeSummary};
use crate::models::{Entry, EntryId};
use crate::Result;

/// Single point of access to the local store.
///
/// Every operation delegates to [`LibSqlEntryRepository`] under one lock.
/// After each committed write the full list is re-read and published, so
/// [`JournalRepository::entries`] behaves like a live query.
#[derive(Clone)]
pub struct JournalRepository {
    db: Arc<Mutex<Database>>,
    entries_tx: Arc<watch::Sender<Vec<Entry>>>,
}

impl JournalRepository {
    /// Open a repository at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path).await?;
        tracing::debug!("Opened journal database at {}", db_path.display());
        Self::from_database(db).await
    }

    /// Open an in-memory repository (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        Self::from_database(Database::open_in_memory().await?).await
    }

    async fn from_database(db: Database) -> Result<Self> {
        let initial = LibSqlEntryRepository::new(db.connection()).list().await?;
        let (entries_tx, _) = watch::channel(initial);
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            entries_tx: Arc::new(entries_tx),
        })
    }

    /// Live view of all entries, newest date first.
    ///
    /// The receiver always holds the latest committed list.
    pub fn entries(&self) -> watch::Receiver<Vec<Entry>> {
        self.entries_tx.subscribe()
    }

    /// List all entries, newest date first.
    pub async fn list(&self) -> Result<Vec<Entry>> {
        let db = self.db.lock().await;
        LibSqlEntryRepository::new(db.connection()).list().await
    }

    /// Fetch an entry by id.
    pub async fn get(&self, id: EntryId) -> Result<Option<Entry>> {
        let db = self.db.lock().await;
        LibSqlEntryRepository::new(db.connection()).get(id).await
    }

    /// Insert an entry, returning it with its assigned id.
    pub async fn insert(&self, entry: &Entry) -> Result<Entry> {
        let db = self.db.lock().await;
        let repo = LibSqlEntryRepository::new(db.connection());
        let saved = repo.insert(entry).await?;
        self.publish(&repo).await?;
        Ok(saved)
    }

    /// Overwrite an existing entry.
    pub async fn update(&self, entry: &Entry) -> Result<Entry> {
        let db = self.db.lock().await;
        let repo = LibSqlEntryRepository::new(db.connection());
        let updated = repo.update(entry).await?;
        self.publish(&repo).await?;
        Ok(updated)
    }

    /// Delete an entry.
    pub async fn delete(&self, id: EntryId) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlEntryRepository::new(db.connection());
        repo.delete(id).await?;
        self.publish(&repo).await
    }

    /// Replace the whole table with `entries`.
    pub async fn replace_all(&self, entries: &[Entry]) -> Result<usize> {
        let db = self.db.lock().await;
        let repo = LibSqlEntryRepository::new(db.connection());
        let count = repo.replace_all(entries).await?;
        self.publish(&repo).await?;
        Ok(count)
    }

    /// Reconcile the table with `entries` by id, leaving `protected` ids alone.
    pub async fn merge_snapshot(
        &self,
        entries: &[Entry],
        protected: &HashSet<EntryId>,
    ) -> Result<MergeSummary> {
        let db = self.db.lock().await;
        let repo = LibSqlEntryRepository::new(db.connection());
        let summary = repo.merge_snapshot(entries, protected).await?;
        self.publish(&repo).await?;
        Ok(summary)
    }

    /// Number of stored entries.
    pub async fn count(&self) -> Result<usize> {
        let db = self.db.lock().await;
        LibSqlEntryRepository::new(db.connection()).count().await
    }

    async fn publish(&self, repo: &LibSqlEntryRepository<'_>) -> Result<()> {
        let entries = repo.list().await?;
        self.entries_tx.send_replace(entries);
        Ok(())
    }
}
