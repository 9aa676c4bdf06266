use journal_core::browse;
use journal_core::config::JournalConfig;
use journal_core::Entry;

use crate::commands::common::{apply_limit, normalize_search_query, print_entries};
use crate::error::CliError;
use crate::session::Session;

pub async fn run_list(
    limit: Option<usize>,
    as_json: bool,
    config: &JournalConfig,
) -> Result<(), CliError> {
    let session = Session::open(config).await?;
    let entries = session.list().await;
    session.close().await;

    let entries = entries?;
    let entries = entries.iter().collect::<Vec<&Entry>>();
    print_entries(&apply_limit(entries, limit), as_json)
}

pub async fn run_search(
    query: &str,
    limit: Option<usize>,
    as_json: bool,
    config: &JournalConfig,
) -> Result<(), CliError> {
    let query = normalize_search_query(query)?;

    let session = Session::open(config).await?;
    let entries = session.list().await;
    session.close().await;

    let entries = entries?;
    let matches = browse::search(&entries, &query);
    print_entries(&apply_limit(matches, limit), as_json)
}
