//! Runtime configuration read from the environment.
//!
//! Front ends call `dotenvy::dotenv()` first, so a `.env` file next to the
//! binary works the same as exported variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::remote::FirestoreConfig;
use crate::sync::ReconcileMode;

pub const ENV_DB_PATH: &str = "JOURNAL_DB_PATH";
pub const ENV_FIRESTORE_PROJECT: &str = "JOURNAL_FIRESTORE_PROJECT";
pub const ENV_FIRESTORE_DATABASE: &str = "JOURNAL_FIRESTORE_DATABASE";
pub const ENV_FIRESTORE_API_KEY: &str = "JOURNAL_FIRESTORE_API_KEY";
pub const ENV_FIRESTORE_TOKEN: &str = "JOURNAL_FIRESTORE_TOKEN";
pub const ENV_FIRESTORE_BASE_URL: &str = "JOURNAL_FIRESTORE_BASE_URL";
pub const ENV_COLLECTION: &str = "JOURNAL_COLLECTION";
pub const ENV_POLL_INTERVAL_SECS: &str = "JOURNAL_POLL_INTERVAL_SECS";
pub const ENV_RECONCILE: &str = "JOURNAL_RECONCILE";

/// Everything a front end needs to open the journal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournalConfig {
    /// Explicit database path; `None` means [`default_db_path`]
    pub db_path: Option<PathBuf>,
    /// Remote collection to mirror; `None` runs local-only
    pub remote: Option<FirestoreConfig>,
    pub reconcile: ReconcileMode,
}

impl JournalConfig {
    /// Read the configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let reconcile = match get(ENV_RECONCILE) {
            Some(raw) => raw
                .parse::<ReconcileMode>()
                .map_err(|error| Error::Config(format!("{ENV_RECONCILE}: {error}")))?,
            None => ReconcileMode::default(),
        };

        let remote = match get(ENV_FIRESTORE_PROJECT) {
            Some(project) => {
                let mut config = FirestoreConfig::new(project);
                if let Some(database) = get(ENV_FIRESTORE_DATABASE) {
                    config = config.with_database(database);
                }
                if let Some(collection) = get(ENV_COLLECTION) {
                    config = config.with_collection(collection);
                }
                if let Some(api_key) = get(ENV_FIRESTORE_API_KEY) {
                    config = config.with_api_key(api_key);
                }
                if let Some(token) = get(ENV_FIRESTORE_TOKEN) {
                    config = config.with_bearer_token(token);
                }
                if let Some(base_url) = get(ENV_FIRESTORE_BASE_URL) {
                    config = config.with_base_url(parse_http_url(&base_url)?);
                }
                if let Some(raw) = get(ENV_POLL_INTERVAL_SECS) {
                    config = config.with_poll_interval(parse_poll_interval(&raw)?);
                }
                Some(config)
            }
            None => None,
        };

        Ok(Self {
            db_path: get(ENV_DB_PATH).map(PathBuf::from),
            remote,
            reconcile,
        })
    }

    /// The configured database path, or the platform default
    pub fn resolved_db_path(&self) -> Result<PathBuf> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => default_db_path(),
        }
    }
}

/// `<data dir>/journal/journal.db`
pub fn default_db_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| Error::Config("could not determine data directory".into()))?;
    Ok(data_dir.join("journal").join("journal.db"))
}

fn parse_poll_interval(raw: &str) -> Result<Duration> {
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(Error::Config(format!(
            "{ENV_POLL_INTERVAL_SECS} must be a positive number of seconds, got '{raw}'"
        ))),
    }
}

fn parse_http_url(raw: &str) -> Result<String> {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        Ok(raw.trim_end_matches('/').to_string())
    } else {
        Err(Error::Config(format!(
            "{ENV_FIRESTORE_BASE_URL} must be an http(s) URL, got '{raw}'"
        )))
    }
}
