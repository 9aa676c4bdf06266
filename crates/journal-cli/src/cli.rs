use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use journal_core::browse::MAX_TREND_DAYS;
use journal_core::{EntryId, Mood};

#[derive(Parser)]
#[command(name = "journal")]
#[command(about = "Keep a journal locally and mirror it to the cloud")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a new entry
    #[command(alias = "new")]
    Add {
        /// Entry title
        title: String,
        /// Entry text (read from stdin or $EDITOR when omitted)
        #[arg(short, long)]
        content: Option<String>,
        /// Entry date (defaults to today, YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
        /// Mood: bad, okay, good or 1-3
        #[arg(short, long)]
        mood: Option<Mood>,
        /// Image URI to attach
        #[arg(long, value_name = "URI")]
        image: Option<String>,
        /// Location as "latitude,longitude"
        #[arg(long, value_name = "LAT,LON", allow_hyphen_values = true)]
        location: Option<String>,
    },
    /// List entries, newest first
    List {
        /// Number of entries to show
        #[arg(short, long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one entry in full
    Show {
        /// Entry ID
        id: EntryId,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit the title or text of an entry
    Edit {
        /// Entry ID
        id: EntryId,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New text (opens $EDITOR when neither flag is given)
        #[arg(short, long)]
        content: Option<String>,
    },
    /// Delete an entry
    Delete {
        /// Entry ID
        id: EntryId,
    },
    /// Search titles and text
    Search {
        /// Search query
        query: String,
        /// Number of entries to show
        #[arg(short, long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show which days of a month have entries
    Calendar {
        /// Month to show, YYYY-MM (defaults to the current month)
        #[arg(long, conflicts_with = "day")]
        month: Option<String>,
        /// List the entries of one day, YYYY-MM-DD
        #[arg(long)]
        day: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List entries with an attached image
    Media {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List entries with a usable location
    Map {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Chart mood over the last days
    Mood {
        /// Number of days to chart, ending today
        #[arg(
            short,
            long,
            default_value = "7",
            value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_TREND_DAYS))
        )]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Follow the remote collection until Ctrl-C
    Watch,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}
