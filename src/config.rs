//! Runtime configuration read from the environment.

use std::path::PathBuf;

use anyhow::Result;

use crate::utils::get_database_path;

/// Overrides the database location.
pub const DATABASE_ENV: &str = "LEARNLOG_DATABASE";
/// Log filter directive, e.g. `learnlog=debug`.
pub const LOG_ENV: &str = "LEARNLOG_LOG";
/// Filter used when `LEARNLOG_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "learnlog=info";

/// Settings resolved at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_path: PathBuf,
    pub log_filter: String,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_env()
    }

    /// Reads settings from the process environment only.
    ///
    /// Empty values are treated as unset.
    pub fn from_env() -> Result<Self> {
        let database_path = match non_empty_var(DATABASE_ENV) {
            Some(path) => PathBuf::from(path),
            None => get_database_path()?,
        };
        let log_filter =
            non_empty_var(LOG_ENV).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            database_path,
            log_filter,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
