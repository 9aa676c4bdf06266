use journal_core::config::JournalConfig;
use journal_core::util::normalize_text_option;
use journal_core::{Entry, Mood};

use crate::commands::common::{resolve_entry_content, today};
use crate::error::CliError;
use crate::session::Session;

pub struct AddArgs {
    pub title: String,
    pub content: Option<String>,
    pub date: Option<String>,
    pub mood: Option<Mood>,
    pub image: Option<String>,
    pub location: Option<String>,
}

impl AddArgs {
    pub fn into_entry(self, content: String) -> Entry {
        let date = normalize_text_option(self.date)
            .unwrap_or_else(|| today().format("%Y-%m-%d").to_string());

        Entry {
            id: None,
            title: self.title.trim().to_string(),
            content,
            date,
            mood: self.mood,
            image_uri: normalize_text_option(self.image),
            location: normalize_text_option(self.location),
        }
    }
}

pub async fn run_add(args: AddArgs, config: &JournalConfig) -> Result<(), CliError> {
    let content = resolve_entry_content(args.content.as_deref())?;
    let entry = args.into_entry(content);
    if entry.location.is_some() && entry.coordinates().is_none() {
        tracing::warn!("Location is not \"latitude,longitude\"; it will not appear on the map");
    }

    let session = Session::open(config).await?;
    let saved = session.add(&entry).await;
    session.close().await;

    if let Some(id) = saved?.id {
        println!("{id}");
    }
    Ok(())
}
