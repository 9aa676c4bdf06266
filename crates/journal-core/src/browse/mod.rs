//! Read-only views over the entry list.
//!
//! Everything here works on a slice already pulled from
//! [`JournalRepository`](crate::JournalRepository), so front ends can
//! recompute a view on every published list without touching storage.

mod dates;
mod mood;

pub use dates::{dates_with_entries, entries_on, parse_entry_date};
pub use mood::{mood_trend, MoodPoint, MAX_TREND_DAYS};

use serde::Serialize;

use crate::models::{Coordinates, Entry, EntryId};

/// An entry that can be placed on a map
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPin {
    pub id: Option<EntryId>,
    pub title: String,
    pub coordinates: Coordinates,
}

/// Entries whose title or content contains `query`, ignoring case.
///
/// A blank query matches everything.
pub fn search<'a>(entries: &'a [Entry], query: &str) -> Vec<&'a Entry> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return entries.iter().collect();
    }

    entries
        .iter()
        .filter(|entry| {
            entry.title.to_lowercase().contains(&needle)
                || entry.content.to_lowercase().contains(&needle)
        })
        .collect()
}

/// Entries with an attached image
pub fn with_images(entries: &[Entry]) -> Vec<&Entry> {
    entries.iter().filter(|entry| entry.has_image()).collect()
}

/// Pins for every entry whose location parses
pub fn map_pins(entries: &[Entry]) -> Vec<MapPin> {
    entries
        .iter()
        .filter_map(|entry| {
            entry.coordinates().map(|coordinates| MapPin {
                id: entry.id,
                title: entry.title.clone(),
                coordinates,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Vec<Entry> {
        vec![
            Entry::new("Morning run", "Five km by the river", "2024-03-02")
                .with_id(EntryId::new(3))
                .with_location("51.5,-0.12"),
            Entry::new("Groceries", "Bought RIVER trout", "2024-03-01")
                .with_id(EntryId::new(2))
                .with_image("content://media/2")
                .with_location("somewhere"),
            Entry::new("Quiet day", "Nothing much", "2024-02-28")
                .with_id(EntryId::new(1))
                .with_image("   "),
        ]
    }

    #[test]
    fn search_matches_title_or_content_case_insensitively() {
        let entries = sample();
        let titles = search(&entries, "river")
            .into_iter()
            .map(|entry| entry.title.as_str())
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["Morning run", "Groceries"]);

        assert_eq!(search(&entries, "QUIET").len(), 1);
        assert!(search(&entries, "absent").is_empty());
    }

    #[test]
    fn blank_search_returns_everything() {
        let entries = sample();
        assert_eq!(search(&entries, "  ").len(), entries.len());
    }

    #[test]
    fn media_skips_blank_image_uris() {
        let entries = sample();
        let media = with_images(&entries);
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].id, Some(EntryId::new(2)));
    }

    #[test]
    fn map_only_pins_parsable_locations() {
        let entries = sample();
        assert_eq!(
            map_pins(&entries),
            vec![MapPin {
                id: Some(EntryId::new(3)),
                title: "Morning run".to_string(),
                coordinates: Coordinates::new(51.5, -0.12),
            }]
        );
    }
}
