//! Core runtime configuration.
//!
//! Resolved once at startup and passed into the core; nothing reads the
//! environment while handling requests.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Environment variable holding the SQLite path.
pub const DB_PATH_VAR: &str = "CLINICA_DB_PATH";
/// Environment variable holding the remote API base URL.
pub const API_URL_VAR: &str = "CLINICA_API_URL";
/// Environment variable holding the search debounce in milliseconds.
pub const SEARCH_DEBOUNCE_VAR: &str = "CLINICA_SEARCH_DEBOUNCE_MS";

pub const DEFAULT_DB_PATH: &str = "clinica.db";
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;
pub const MAX_SEARCH_DEBOUNCE_MS: u64 = 5_000;

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{var} must be a whole number of milliseconds, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must be at most {max}, got {value}")]
    OutOfRange {
        var: &'static str,
        value: u64,
        max: u64,
    },

    #[error("{var} must be an http(s) URL, got {value:?}")]
    InvalidUrl { var: &'static str, value: String },

    #[error("{0} cannot be empty")]
    Empty(&'static str),
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct CoreConfig {
    db_path: PathBuf,
    api_url: String,
    search_debounce: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            api_url: DEFAULT_API_URL.to_string(),
            search_debounce: Duration::from_millis(DEFAULT_SEARCH_DEBOUNCE_MS),
        }
    }
}

impl CoreConfig {
    /// Create a validated `CoreConfig`.
    pub fn new(db_path: PathBuf, api_url: String, search_debounce_ms: u64) -> Result<Self, ConfigError> {
        if db_path.as_os_str().is_empty() {
            return Err(ConfigError::Empty(DB_PATH_VAR));
        }
        let api_url = api_url.trim().trim_end_matches('/').to_string();
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl {
                var: API_URL_VAR,
                value: api_url,
            });
        }
        if search_debounce_ms > MAX_SEARCH_DEBOUNCE_MS {
            return Err(ConfigError::OutOfRange {
                var: SEARCH_DEBOUNCE_VAR,
                value: search_debounce_ms,
                max: MAX_SEARCH_DEBOUNCE_MS,
            });
        }

        Ok(Self {
            db_path,
            api_url,
            search_debounce: Duration::from_millis(search_debounce_ms),
        })
    }

    /// Read from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through a lookup function. Unset or blank values take the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let db_path = get(DB_PATH_VAR).unwrap_or_else(|| DEFAULT_DB_PATH.into());
        let api_url = get(API_URL_VAR).unwrap_or_else(|| DEFAULT_API_URL.into());
        let debounce = match get(SEARCH_DEBOUNCE_VAR) {
            Some(value) => value.parse::<u64>().map_err(|_| ConfigError::InvalidNumber {
                var: SEARCH_DEBOUNCE_VAR,
                value,
            })?,
            None => DEFAULT_SEARCH_DEBOUNCE_MS,
        };

        Self::new(PathBuf::from(db_path), api_url, debounce)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Full URL of a remote endpoint, e.g. `endpoint("pacientes")`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }

    pub fn search_debounce(&self) -> Duration {
        self.search_debounce
    }
}
