//! Geolocation attached to an entry

use serde::{Deserialize, Serialize};
use std::fmt;

/// A latitude/longitude pair parsed from an entry's `location` string
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Parse a `"latitude,longitude"` string.
    ///
    /// Returns `None` for anything that is not exactly two comma-separated
    /// finite numbers. Surrounding whitespace on either half is ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use journal_core::Coordinates;
    ///
    /// let coords = Coordinates::parse("1.5,2.5").unwrap();
    /// assert_eq!(coords.latitude, 1.5);
    /// assert!(Coordinates::parse("1.5").is_none());
    /// ```
    pub fn parse(value: &str) -> Option<Self> {
        let (lat, lng) = value.split_once(',')?;
        if lng.contains(',') {
            return None;
        }

        let latitude = parse_component(lat)?;
        let longitude = parse_component(lng)?;
        Some(Self::new(latitude, longitude))
    }
}

fn parse_component(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_pair() {
        assert_eq!(
            Coordinates::parse("1.5,2.5"),
            Some(Coordinates::new(1.5, 2.5))
        );
        assert_eq!(
            Coordinates::parse("-6.2088, 106.8456"),
            Some(Coordinates::new(-6.2088, 106.8456))
        );
    }

    #[test]
    fn rejects_missing_comma() {
        assert_eq!(Coordinates::parse("1.5 2.5"), None);
        assert_eq!(Coordinates::parse(""), None);
    }

    #[test]
    fn rejects_non_numeric_half() {
        assert_eq!(Coordinates::parse("abc,2.5"), None);
        assert_eq!(Coordinates::parse("1.5,"), None);
        assert_eq!(Coordinates::parse(",2.5"), None);
    }

    #[test]
    fn rejects_extra_components() {
        assert_eq!(Coordinates::parse("1,2,3"), None);
    }

    #[test]
    fn rejects_non_finite_values() {
        assert_eq!(Coordinates::parse("NaN,1"), None);
        assert_eq!(Coordinates::parse("1,inf"), None);
    }

    #[test]
    fn display_round_trips_through_parse() {
        let coords = Coordinates::new(48.8566, 2.3522);
        assert_eq!(Coordinates::parse(&coords.to_string()), Some(coords));
    }
}
