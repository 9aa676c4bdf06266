//! Shared sync state types.

/// Where the inbound side of the sync controller currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    /// Subscribed, no snapshot applied yet
    Connecting,
    /// Last snapshot was applied to the local store
    Synced,
    /// Last listener event or local apply failed
    Error,
}

/// Snapshot of inbound progress, published on a watch channel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncStatus {
    pub state: SyncState,
    /// Number of remote snapshots applied since start
    pub snapshots_applied: u64,
    /// Valid entries in the most recently applied snapshot
    pub last_snapshot_len: usize,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            state: SyncState::Connecting,
            snapshots_applied: 0,
            last_snapshot_len: 0,
        }
    }
}
