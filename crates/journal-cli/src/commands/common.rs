use std::env;
use std::fmt::Write as _;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Datelike, NaiveDate};
use journal_core::browse::{MapPin, MoodPoint};
use journal_core::{Coordinates, Entry, Mood};
use serde::Serialize;

use crate::error::CliError;

const MOOD_BAR_WIDTH: f64 = 12.0;

#[derive(Debug, Serialize)]
pub struct EntryListItem {
    pub id: Option<i64>,
    pub title: String,
    pub preview: String,
    pub date: String,
    pub mood: Option<Mood>,
    pub image_uri: Option<String>,
    pub coordinates: Option<Coordinates>,
}

pub fn entry_to_list_item(entry: &Entry) -> EntryListItem {
    EntryListItem {
        id: entry.id.map(|id| id.get()),
        title: entry.title.clone(),
        preview: entry_preview(entry, 80),
        date: entry.date.clone(),
        mood: entry.mood,
        image_uri: entry.image_uri.clone(),
        coordinates: entry.coordinates(),
    }
}

pub fn print_entries(entries: &[&Entry], as_json: bool) -> Result<(), CliError> {
    if as_json {
        let items = entries
            .iter()
            .map(|entry| entry_to_list_item(entry))
            .collect::<Vec<EntryListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if entries.is_empty() {
        println!("No entries.");
    } else {
        for line in format_entry_lines(entries) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_entry_lines(entries: &[&Entry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let id = entry
                .id
                .map_or_else(|| "-".to_string(), |id| id.to_string());
            let mood = entry.mood.map_or("-", Mood::as_str);
            let title = truncate_chars(&entry.title, 24);
            let preview = entry_preview(entry, 40);
            format!(
                "{id:>5}  {:<12}  {mood:<5} {title:<24}  {preview}",
                entry.date
            )
        })
        .collect()
}

pub fn format_entry_detail(entry: &Entry) -> String {
    let mut out = String::new();
    let id = entry
        .id
        .map_or_else(|| "-".to_string(), |id| id.to_string());
    let _ = writeln!(out, "#{id}  {}", entry.title);
    let _ = writeln!(out, "Date:     {}", entry.date);
    let _ = writeln!(
        out,
        "Mood:     {}",
        entry.mood.map_or("unrated", Mood::as_str)
    );
    if let Some(image) = entry.image_uri.as_deref().filter(|_| entry.has_image()) {
        let _ = writeln!(out, "Image:    {image}");
    }
    match (entry.location.as_deref(), entry.coordinates()) {
        (_, Some(coordinates)) => {
            let _ = writeln!(out, "Location: {coordinates}");
        }
        (Some(raw), None) => {
            let _ = writeln!(out, "Location: {raw} (unreadable)");
        }
        (None, None) => {}
    }
    let _ = write!(out, "\n{}", entry.content);
    out
}

pub fn entry_preview(entry: &Entry, max_chars: usize) -> String {
    let first_line = entry.content.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&collapsed, max_chars)
}

pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = value.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

/// Month grid, Monday first, with `*` after days that have entries
pub fn format_calendar(year: i32, month: u32, marked: &[NaiveDate]) -> Vec<String> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };

    let mut lines = vec![
        first.format("%B %Y").to_string(),
        " Mo  Tu  We  Th  Fr  Sa  Su".to_string(),
    ];

    let mut line = "    ".repeat(first.weekday().num_days_from_monday() as usize);
    let mut day = first;
    while day.month() == month {
        let mark = if marked.contains(&day) { '*' } else { ' ' };
        let _ = write!(line, "{:>3}{mark}", day.day());
        if day.weekday().num_days_from_monday() == 6 {
            lines.push(line.trim_end().to_string());
            line = String::new();
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    if !line.trim().is_empty() {
        lines.push(line.trim_end().to_string());
    }
    lines
}

pub fn format_pin_lines(pins: &[MapPin]) -> Vec<String> {
    pins.iter()
        .map(|pin| {
            let id = pin
                .id
                .map_or_else(|| "-".to_string(), |id| id.to_string());
            let position = format!(
                "{:.5},{:.5}",
                pin.coordinates.latitude, pin.coordinates.longitude
            );
            format!("{id:>5}  {position:<24}  {}", pin.title)
        })
        .collect()
}

pub fn format_mood_lines(points: &[MoodPoint]) -> Vec<String> {
    points
        .iter()
        .map(|point| {
            let label = point.date.format("%a %d %b");
            match point.average {
                Some(average) => {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let width = (average / 3.0 * MOOD_BAR_WIDTH).round() as usize;
                    format!("{label}  {:<12}  {average:.1}", "#".repeat(width))
                }
                None => format!("{label}  {:<12}  -", ""),
            }
        })
        .collect()
}

pub fn parse_month(raw: &str) -> Result<(i32, u32), CliError> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(&format!("{trimmed}-01"), "%Y-%m-%d")
        .map(|date| (date.year(), date.month()))
        .map_err(|_| CliError::InvalidDate(trimmed.to_string()))
}

pub fn parse_day(raw: &str) -> Result<NaiveDate, CliError> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|_| CliError::InvalidDate(trimmed.to_string()))
}

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub fn apply_limit<T>(mut items: Vec<T>, limit: Option<usize>) -> Vec<T> {
    if let Some(limit) = limit {
        items.truncate(limit);
    }
    items
}

pub fn resolve_entry_content(content: Option<&str>) -> Result<String, CliError> {
    if let Some(content) = content.and_then(normalize_content) {
        return Ok(content);
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }

    if let Some(content) = capture_editor_input_with_initial("")? {
        return Ok(content);
    }

    Err(CliError::EmptyContent)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_search_query(query: &str) -> Result<String, CliError> {
    normalize_content(query).ok_or(CliError::EmptySearchQuery)
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_entry_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    let status = match Command::new(editor).arg(file_path).status() {
        Ok(status) => status,
        // EDITOR may carry arguments, e.g. "code --wait"
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };
            Command::new(program).args(parts).arg(file_path).status()?
        }
        Err(err) => return Err(CliError::Io(err)),
    };

    if status.success() {
        Ok(())
    } else {
        Err(CliError::EditorFailed(format!(
            "`{editor}` exited with status {status}"
        )))
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

fn create_temp_entry_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("journal-entry-{}-{now}.md", std::process::id()))
}
