//! Mood trend over a trailing window of days

use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use super::parse_entry_date;
use crate::models::Entry;

/// Average mood of one day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodPoint {
    pub date: NaiveDate,
    /// Mean mood level of the rated entries, `None` when there were none
    pub average: Option<f64>,
    /// Number of rated entries that day
    pub rated: usize,
}

/// Longest window a trend covers
pub const MAX_TREND_DAYS: u32 = 366;

/// One point per day for the `days` days ending on `today`, oldest first.
///
/// Unrated entries and entries with unparsable dates are ignored. Windows
/// longer than [`MAX_TREND_DAYS`] are cut to it.
pub fn mood_trend(entries: &[Entry], today: NaiveDate, days: u32) -> Vec<MoodPoint> {
    let mut levels: HashMap<NaiveDate, Vec<i64>> = HashMap::new();
    for entry in entries {
        if let (Some(mood), Some(date)) = (entry.mood, parse_entry_date(&entry.date)) {
            levels.entry(date).or_default().push(mood.level());
        }
    }

    (0..days.min(MAX_TREND_DAYS))
        .rev()
        .filter_map(|offset| today.checked_sub_days(Days::new(u64::from(offset))))
        .map(|date| {
            let day_levels = levels.get(&date).map_or(&[][..], Vec::as_slice);
            let average = if day_levels.is_empty() {
                None
            } else {
                #[allow(clippy::cast_precision_loss)]
                let mean = day_levels.iter().sum::<i64>() as f64 / day_levels.len() as f64;
                Some(mean)
            };
            MoodPoint {
                date,
                average,
                rated: day_levels.len(),
            }
        })
        .collect()
}
