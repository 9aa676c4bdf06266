//! Journal CLI - write, browse and mirror journal entries from the terminal

mod cli;
mod commands;
mod error;
mod session;


use clap::Parser;
use journal_core::config::JournalConfig;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::{
    run_add, run_calendar, run_completions, run_delete, run_edit, run_list, run_map, run_media,
    run_mood, run_search, run_show, run_watch, AddArgs,
};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("journal=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let mut config = JournalConfig::from_env()?;
    if let Some(db_path) = cli.db_path {
        config.db_path = Some(db_path);
    }

    match cli.command {
        Commands::Add {
            title,
            content,
            date,
            mood,
            image,
            location,
        } => {
            let args = AddArgs {
                title,
                content,
                date,
                mood,
                image,
                location,
            };
            run_add(args, &config).await?;
        }
        Commands::List { limit, json } => run_list(limit, json, &config).await?,
        Commands::Show { id, json } => run_show(id, json, &config).await?,
        Commands::Edit { id, title, content } => {
            run_edit(id, title, content, &config).await?;
        }
        Commands::Delete { id } => run_delete(id, &config).await?,
        Commands::Search { query, limit, json } => {
            run_search(&query, limit, json, &config).await?;
        }
        Commands::Calendar { month, day, json } => {
            run_calendar(month.as_deref(), day.as_deref(), json, &config).await?;
        }
        Commands::Media { json } => run_media(json, &config).await?,
        Commands::Map { json } => run_map(json, &config).await?,
        Commands::Mood { days, json } => run_mood(days, json, &config).await?,
        Commands::Watch => run_watch(&config).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
