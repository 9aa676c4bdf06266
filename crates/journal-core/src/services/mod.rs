//! Shared services used by front ends

mod journal;

pub use journal::JournalRepository;
