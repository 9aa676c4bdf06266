use std::io;

use journal_core::EntryId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] journal_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No entry content provided")]
    EmptyContent,
    #[error("Edited entry content cannot be empty")]
    EmptyEditedContent,
    #[error("Search query cannot be empty")]
    EmptySearchQuery,
    #[error("Entry not found: {0}")]
    EntryNotFound(EntryId),
    #[error("Invalid date '{0}'")]
    InvalidDate(String),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Remote sync is not configured. Set JOURNAL_FIRESTORE_PROJECT to enable it.")]
    SyncNotConfigured,
}
