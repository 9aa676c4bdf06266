//! Data models for Journal

mod entry;
mod location;
mod mood;

pub use entry::{Entry, EntryId};
pub use location::Coordinates;
pub use mood::Mood;
