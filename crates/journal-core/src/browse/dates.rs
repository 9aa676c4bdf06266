//! Calendar views

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, NaiveDate};

use crate::models::Entry;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d %b %Y", "%d %B %Y"];

/// Parse the free-form date of an entry.
///
/// Accepts `2024-03-05`, RFC 3339 timestamps and `05 Mar 2024`. Anything
/// else is `None`, which keeps the entry out of date-keyed views.
pub fn parse_entry_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Some(timestamp.date_naive());
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

/// Days of `year`/`month` that have at least one entry
pub fn dates_with_entries(entries: &[Entry], year: i32, month: u32) -> BTreeSet<NaiveDate> {
    entries
        .iter()
        .filter_map(|entry| parse_entry_date(&entry.date))
        .filter(|date| date.year() == year && date.month() == month)
        .collect()
}

/// Entries written on `date`
pub fn entries_on(entries: &[Entry], date: NaiveDate) -> Vec<&Entry> {
    entries
        .iter()
        .filter(|entry| parse_entry_date(&entry.date) == Some(date))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn day(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn parses_supported_date_forms() {
        assert_eq!(parse_entry_date("2024-03-05"), Some(day(2024, 3, 5)));
        assert_eq!(parse_entry_date(" 05 Mar 2024 "), Some(day(2024, 3, 5)));
        assert_eq!(parse_entry_date("5 March 2024"), Some(day(2024, 3, 5)));
        assert_eq!(
            parse_entry_date("2024-03-05T23:10:00+07:00"),
            Some(day(2024, 3, 5))
        );
    }

    #[test]
    fn unparsable_dates_are_none() {
        assert_eq!(parse_entry_date(""), None);
        assert_eq!(parse_entry_date("yesterday"), None);
        assert_eq!(parse_entry_date("2024-13-01"), None);
    }

    #[test]
    fn calendar_marks_days_in_the_requested_month() {
        let entries = vec![
            Entry::new("a", "x", "2024-03-05"),
            Entry::new("b", "x", "05 Mar 2024"),
            Entry::new("c", "x", "2024-03-20"),
            Entry::new("d", "x", "2024-04-01"),
            Entry::new("e", "x", "someday"),
        ];

        let days = dates_with_entries(&entries, 2024, 3);
        assert_eq!(
            days.into_iter().collect::<Vec<_>>(),
            vec![day(2024, 3, 5), day(2024, 3, 20)]
        );

        let titles = entries_on(&entries, day(2024, 3, 5))
            .into_iter()
            .map(|entry| entry.title.as_str())
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["a", "b"]);
    }
}
