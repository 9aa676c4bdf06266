//! journal-core - Core library for Journal
//!
//! This crate contains the entry model, the local libSQL store, the remote
//! document stores and the synchronization controller that keeps the two in
//! step. Front ends (the CLI today) only talk to [`JournalRepository`] and
//! [`SyncController`].

pub mod browse;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod services;
pub mod state;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Coordinates, Entry, EntryId, Mood};
pub use services::JournalRepository;
pub use state::{SyncState, SyncStatus};
pub use sync::{OutboundEvent, OutboundOp, ReconcileMode, SyncController, SyncOptions};
