use journal_core::config::JournalConfig;
use journal_core::EntryId;

use crate::error::CliError;
use crate::session::Session;

pub async fn run_delete(id: EntryId, config: &JournalConfig) -> Result<(), CliError> {
    let session = Session::open(config).await?;
    let result = match session.require(id).await {
        Ok(entry) => session.delete(&entry).await,
        Err(error) => Err(error),
    };
    session.close().await;

    result?;
    println!("{id}");
    Ok(())
}
