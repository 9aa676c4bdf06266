//! Journal entry model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Coordinates, Mood};
use crate::error::{Error, Result};

/// Identifier of an entry.
///
/// Assigned by the local store on insert. Its decimal form is the key of the
/// mirrored remote document, so both stores share one identifier space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(i64);

impl EntryId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for EntryId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntryId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// A journal entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// `None` until the local store has assigned one
    pub id: Option<EntryId>,
    pub title: String,
    pub content: String,
    /// Free-form date text, usually `YYYY-MM-DD`
    pub date: String,
    pub mood: Option<Mood>,
    /// Opaque reference to an attached photo
    pub image_uri: Option<String>,
    /// Expected as `"latitude,longitude"`; see [`Entry::coordinates`]
    pub location: Option<String>,
}

impl Entry {
    /// Create an unsaved entry
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            title: title.into(),
            content: content.into(),
            date: date.into(),
            mood: None,
            image_uri: None,
            location: None,
        }
    }

    #[must_use]
    pub const fn with_id(mut self, id: EntryId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub const fn with_mood(mut self, mood: Mood) -> Self {
        self.mood = Some(mood);
        self
    }

    #[must_use]
    pub fn with_image(mut self, image_uri: impl Into<String>) -> Self {
        self.image_uri = Some(image_uri.into());
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Parsed coordinates, or `None` when the location is absent or malformed
    pub fn coordinates(&self) -> Option<Coordinates> {
        self.location.as_deref().and_then(Coordinates::parse)
    }

    /// Whether a non-blank image reference is attached
    pub fn has_image(&self) -> bool {
        self.image_uri
            .as_deref()
            .is_some_and(|uri| !uri.trim().is_empty())
    }

    /// Check the fields a user must fill in before saving.
    ///
    /// The store itself accepts empty text; front ends call this before
    /// handing an entry over.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidInput("entry title cannot be empty".into()));
        }
        if self.content.trim().is_empty() {
            return Err(Error::InvalidInput("entry content cannot be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_id_parse() {
        let id: EntryId = "42".parse().unwrap();
        assert_eq!(id, EntryId::new(42));
        assert_eq!(id.to_string(), "42");
        assert!("x".parse::<EntryId>().is_err());
    }

    #[test]
    fn test_entry_new_is_unsaved() {
        let entry = Entry::new("Title", "Body", "2024-05-01");
        assert!(entry.id.is_none());
        assert!(entry.mood.is_none());
        assert!(entry.image_uri.is_none());
        assert!(entry.location.is_none());
    }

    #[test]
    fn test_coordinates_from_location() {
        let entry = Entry::new("t", "c", "d").with_location("1.5,2.5");
        assert_eq!(entry.coordinates(), Some(Coordinates::new(1.5, 2.5)));

        let malformed = Entry::new("t", "c", "d").with_location("somewhere");
        assert_eq!(malformed.coordinates(), None);
    }

    #[test]
    fn test_has_image_ignores_blank_uri() {
        assert!(Entry::new("t", "c", "d")
            .with_image("content://photo/1")
            .has_image());
        assert!(!Entry::new("t", "c", "d").with_image("  ").has_image());
        assert!(!Entry::new("t", "c", "d").has_image());
    }

    #[test]
    fn test_validate() {
        assert!(Entry::new("Title", "Body", "").validate().is_ok());
        assert!(Entry::new(" ", "Body", "").validate().is_err());
        assert!(Entry::new("Title", "\n", "").validate().is_err());
    }
}
