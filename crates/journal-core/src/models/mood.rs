//! Mood rating attached to an entry

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the day felt, stored as level 1..=3
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Bad,
    Okay,
    Good,
}

impl Mood {
    /// Map a stored level to a mood. Anything outside 1..=3 is unrated.
    pub const fn from_level(level: i64) -> Option<Self> {
        match level {
            1 => Some(Self::Bad),
            2 => Some(Self::Okay),
            3 => Some(Self::Good),
            _ => None,
        }
    }

    pub const fn level(self) -> i64 {
        match self {
            Self::Bad => 1,
            Self::Okay => 2,
            Self::Good => 3,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bad => "bad",
            Self::Okay => "okay",
            Self::Good => "good",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if let Ok(level) = value.parse::<i64>() {
            return Self::from_level(level).ok_or_else(|| format!("mood level {level} is not 1-3"));
        }

        match value.to_ascii_lowercase().as_str() {
            "bad" => Ok(Self::Bad),
            "okay" | "ok" => Ok(Self::Okay),
            "good" => Ok(Self::Good),
            other => Err(format!("unknown mood '{other}'")),
        }
    }
}
