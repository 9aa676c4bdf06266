//! One CLI invocation's view of the journal.
//!
//! With a remote collection configured, writes go through the sync
//! controller and the session waits briefly for the first snapshot so reads
//! see remote changes. Without one, it talks to the repository directly.

use std::sync::Arc;
use std::time::Duration;

use journal_core::config::JournalConfig;
use journal_core::remote::FirestoreRemoteStore;
use journal_core::{
    Entry, EntryId, JournalRepository, OutboundEvent, SyncController, SyncOptions, SyncState,
};
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::error::CliError;

const INITIAL_SYNC_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Session {
    repository: JournalRepository,
    sync: Option<SyncLink>,
}

struct SyncLink {
    controller: SyncController,
    events: broadcast::Receiver<OutboundEvent>,
}

impl Session {
    /// Open the local store and, when configured, start mirroring
    pub async fn open(config: &JournalConfig) -> Result<Self, CliError> {
        let mut session = Self::open_local(config).await?;

        if let Some(remote_config) = config.remote.clone() {
            tracing::debug!("Remote sync enabled: {remote_config:?}");
            let remote = FirestoreRemoteStore::new(remote_config)?;
            let controller = SyncController::start(
                session.repository.clone(),
                Arc::new(remote),
                SyncOptions {
                    reconcile: config.reconcile,
                },
            );
            wait_for_initial_sync(&controller).await;
            let events = controller.outbound_events();
            session.sync = Some(SyncLink { controller, events });
        }

        Ok(session)
    }

    /// Open the local store only
    pub async fn open_local(config: &JournalConfig) -> Result<Self, CliError> {
        let db_path = config.resolved_db_path()?;
        let repository = JournalRepository::open_path(db_path).await?;
        Ok(Self {
            repository,
            sync: None,
        })
    }

    pub fn controller(&self) -> Option<&SyncController> {
        self.sync.as_ref().map(|link| &link.controller)
    }

    pub async fn list(&self) -> Result<Vec<Entry>, CliError> {
        Ok(self.repository.list().await?)
    }

    pub async fn require(&self, id: EntryId) -> Result<Entry, CliError> {
        self.repository
            .get(id)
            .await?
            .ok_or(CliError::EntryNotFound(id))
    }

    pub async fn add(&self, entry: &Entry) -> Result<Entry, CliError> {
        entry.validate()?;
        match &self.sync {
            Some(link) => Ok(link.controller.add_entry(entry).await?),
            None => Ok(self.repository.insert(entry).await?),
        }
    }

    pub async fn update(&self, entry: &Entry) -> Result<(), CliError> {
        entry.validate()?;
        match &self.sync {
            Some(link) => link.controller.update_entry(entry).await?,
            None => {
                self.repository.update(entry).await?;
            }
        }
        Ok(())
    }

    pub async fn delete(&self, entry: &Entry) -> Result<(), CliError> {
        match (&self.sync, entry.id) {
            (Some(link), _) => link.controller.delete_entry(entry).await?,
            (None, Some(id)) => self.repository.delete(id).await?,
            (None, None) => tracing::error!("Entry '{}' has no id; delete skipped", entry.title),
        }
        Ok(())
    }

    /// Finish outstanding remote writes and report the ones that failed
    pub async fn close(self) -> usize {
        let Some(SyncLink {
            controller,
            mut events,
        }) = self.sync
        else {
            return 0;
        };

        controller.shutdown().await;
        report_outbound_failures(&mut events)
    }
}

/// Print every failed remote write still queued on `events`; returns how many
pub(crate) fn report_outbound_failures(events: &mut broadcast::Receiver<OutboundEvent>) -> usize {
    let mut failed = 0;
    loop {
        match events.try_recv() {
            Ok(event) => {
                if let Err(message) = event.outcome {
                    failed += 1;
                    eprintln!(
                        "Warning: entry {} was saved locally but the remote {} failed: {message}",
                        event.id, event.op
                    );
                }
            }
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!("{skipped} remote write outcomes were dropped before they were read");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    failed
}

async fn wait_for_initial_sync(controller: &SyncController) {
    let mut status = controller.status();
    let waited = tokio::time::timeout(
        INITIAL_SYNC_TIMEOUT,
        status.wait_for(|status| status.state != SyncState::Connecting),
    )
    .await;

    match waited {
        Ok(Ok(status)) if status.state == SyncState::Error => {
            tracing::warn!("Remote sync failed; showing local entries");
        }
        Ok(Ok(_)) => {}
        Ok(Err(_)) => tracing::warn!("Sync controller stopped before the first snapshot"),
        Err(_) => tracing::warn!(
            "No remote snapshot after {}s; showing local entries",
            INITIAL_SYNC_TIMEOUT.as_secs()
        ),
    }
}
