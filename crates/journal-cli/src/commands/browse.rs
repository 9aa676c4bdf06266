use chrono::Datelike;
use journal_core::browse::{dates_with_entries, entries_on, map_pins, mood_trend, with_images};
use journal_core::config::JournalConfig;
use journal_core::Entry;

use crate::commands::common::{
    format_calendar, format_mood_lines, format_pin_lines, parse_day, parse_month, print_entries,
    today,
};
use crate::error::CliError;
use crate::session::Session;

async fn load_entries(config: &JournalConfig) -> Result<Vec<Entry>, CliError> {
    let session = Session::open(config).await?;
    let entries = session.list().await;
    session.close().await;
    entries
}

pub async fn run_calendar(
    month: Option<&str>,
    day: Option<&str>,
    as_json: bool,
    config: &JournalConfig,
) -> Result<(), CliError> {
    let day = day.map(parse_day).transpose()?;
    let (year, month) = match (month, day) {
        (Some(raw), _) => parse_month(raw)?,
        (None, Some(day)) => (day.year(), day.month()),
        (None, None) => {
            let today = today();
            (today.year(), today.month())
        }
    };

    let entries = load_entries(config).await?;

    if let Some(day) = day {
        return print_entries(&entries_on(&entries, day), as_json);
    }

    let marked = dates_with_entries(&entries, year, month)
        .into_iter()
        .collect::<Vec<_>>();
    if as_json {
        println!("{}", serde_json::to_string_pretty(&marked)?);
    } else {
        for line in format_calendar(year, month, &marked) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_media(as_json: bool, config: &JournalConfig) -> Result<(), CliError> {
    let entries = load_entries(config).await?;
    let media = with_images(&entries);

    if as_json {
        return print_entries(&media, true);
    }
    if media.is_empty() {
        println!("No entries with images.");
    }
    for entry in media {
        let id = entry
            .id
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        println!(
            "{id:>5}  {:<12}  {}  {}",
            entry.date,
            entry.title,
            entry.image_uri.as_deref().unwrap_or_default()
        );
    }
    Ok(())
}

pub async fn run_map(as_json: bool, config: &JournalConfig) -> Result<(), CliError> {
    let entries = load_entries(config).await?;
    let pins = map_pins(&entries);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&pins)?);
    } else if pins.is_empty() {
        println!("No entries with a location.");
    } else {
        for line in format_pin_lines(&pins) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_mood(days: u32, as_json: bool, config: &JournalConfig) -> Result<(), CliError> {
    let entries = load_entries(config).await?;
    let trend = mood_trend(&entries, today(), days);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&trend)?);
    } else {
        println!("Mood, past {days} days");
        for line in format_mood_lines(&trend) {
            println!("{line}");
        }
    }
    Ok(())
}
