//! Translation between entries and remote documents

use crate::models::{Entry, EntryId, Mood};
use crate::remote::{RemoteDocument, RemoteSnapshot};

pub const FIELD_TITLE: &str = "title";
pub const FIELD_CONTENT: &str = "content";
pub const FIELD_DATE: &str = "date";
pub const FIELD_IMAGE_URI: &str = "imageUri";
pub const FIELD_LOCATION: &str = "location";
pub const FIELD_MOOD_LEVEL: &str = "moodLevel";

/// Render an entry as the document stored under key `id`.
///
/// An unrated entry is written with `moodLevel = 0`.
pub fn entry_to_document(entry: &Entry, id: EntryId) -> RemoteDocument {
    RemoteDocument::new(id.to_string())
        .with_field(FIELD_TITLE, entry.title.as_str())
        .with_field(FIELD_CONTENT, entry.content.as_str())
        .with_field(FIELD_DATE, entry.date.as_str())
        .with_field(FIELD_IMAGE_URI, entry.image_uri.clone())
        .with_field(FIELD_LOCATION, entry.location.clone())
        .with_field(FIELD_MOOD_LEVEL, entry.mood.map_or(0, Mood::level))
}

/// Read an entry back from a document.
///
/// Returns `None` when the key is not an integer or the title is missing.
/// Content and date default to empty text.
pub fn document_to_entry(document: &RemoteDocument) -> Option<Entry> {
    let id = document.id.trim().parse::<EntryId>().ok()?;
    let title = document.get_string(FIELD_TITLE)?;

    Some(Entry {
        id: Some(id),
        title: title.to_string(),
        content: document
            .get_string(FIELD_CONTENT)
            .unwrap_or_default()
            .to_string(),
        date: document.get_string(FIELD_DATE).unwrap_or_default().to_string(),
        mood: document
            .get_integer(FIELD_MOOD_LEVEL)
            .and_then(Mood::from_level),
        image_uri: document.get_string(FIELD_IMAGE_URI).map(str::to_string),
        location: document.get_string(FIELD_LOCATION).map(str::to_string),
    })
}

/// Decode every usable document of a snapshot, dropping the rest
pub fn snapshot_to_entries(snapshot: &RemoteSnapshot) -> Vec<Entry> {
    snapshot
        .documents
        .iter()
        .filter_map(|document| {
            let entry = document_to_entry(document);
            if entry.is_none() {
                tracing::debug!("Skipping malformed remote document '{}'", document.id);
            }
            entry
        })
        .collect()
}
