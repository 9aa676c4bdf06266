//! Database layer for Journal

mod connection;
mod migrations;
mod repository;

pub use connection::Database;
pub use repository::{LibSqlEntryRepository, MergeSummary};
