use journal_core::config::JournalConfig;
use journal_core::SyncState;

use crate::error::CliError;
use crate::session::Session;

/// Keep the sync controller running and report each applied snapshot
pub async fn run_watch(config: &JournalConfig) -> Result<(), CliError> {
    if config.remote.is_none() {
        return Err(CliError::SyncNotConfigured);
    }

    let session = Session::open(config).await?;
    let Some(controller) = session.controller() else {
        return Err(CliError::SyncNotConfigured);
    };

    let mut status = controller.status();
    let mut entries = controller.entries();
    println!(
        "Watching remote collection ({} local entries). Press Ctrl-C to stop.",
        entries.borrow_and_update().len()
    );

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                match current.state {
                    SyncState::Synced => println!(
                        "Snapshot #{} applied: {} remote entries, {} local",
                        current.snapshots_applied,
                        current.last_snapshot_len,
                        entries.borrow_and_update().len()
                    ),
                    SyncState::Error => eprintln!("Sync error; see log for details"),
                    SyncState::Connecting => {}
                }
            }
        }
    }

    session.close().await;
    Ok(())
}
