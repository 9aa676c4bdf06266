use journal_core::config::JournalConfig;
use journal_core::EntryId;

use crate::commands::common::format_entry_detail;
use crate::error::CliError;
use crate::session::Session;

pub async fn run_show(id: EntryId, as_json: bool, config: &JournalConfig) -> Result<(), CliError> {
    let session = Session::open(config).await?;
    let entry = session.require(id).await;
    session.close().await;

    let entry = entry?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        println!("{}", format_entry_detail(&entry));
    }
    Ok(())
}
