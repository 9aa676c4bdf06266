use journal_core::config::JournalConfig;
use journal_core::{Entry, EntryId};

use crate::commands::common::{capture_editor_input_with_initial, normalize_content};
use crate::error::CliError;
use crate::session::Session;

pub async fn run_edit(
    id: EntryId,
    title: Option<String>,
    content: Option<String>,
    config: &JournalConfig,
) -> Result<(), CliError> {
    let session = Session::open(config).await?;
    let result = edit_entry(&session, id, title, content).await;
    session.close().await;

    if let Some(id) = result?.id {
        println!("{id}");
    }
    Ok(())
}

async fn edit_entry(
    session: &Session,
    id: EntryId,
    title: Option<String>,
    content: Option<String>,
) -> Result<Entry, CliError> {
    let entry = session.require(id).await?;
    let edited = apply_edit(&entry, title, content)?;

    if edited == entry {
        return Ok(entry);
    }

    session.update(&edited).await?;
    Ok(edited)
}

/// Title and text are the only editable fields
pub fn apply_edit(
    entry: &Entry,
    title: Option<String>,
    content: Option<String>,
) -> Result<Entry, CliError> {
    let mut edited = entry.clone();

    if title.is_none() && content.is_none() {
        let Some(content) = capture_editor_input_with_initial(&entry.content)? else {
            return Err(CliError::EmptyEditedContent);
        };
        edited.content = content;
        return Ok(edited);
    }

    if let Some(title) = title {
        edited.title = title.trim().to_string();
    }
    if let Some(content) = content {
        edited.content = normalize_content(&content).ok_or(CliError::EmptyEditedContent)?;
    }
    Ok(edited)
}
