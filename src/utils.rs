//! Shared helpers for paths, tag input and duration formatting.
//!
//! These functions are reused across the CLI and the command surface.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Gets the cross-platform database path.
///
/// Returns the path as `{data_dir}/learnlog/learnlog.db` where `data_dir` is:
/// - Linux: `~/.local/share`
/// - macOS: `~/Library/Application Support`
/// - Windows: `C:\Users\<user>\AppData\Roaming`
///
/// # Errors
///
/// Returns an error if the data directory cannot be determined.
pub fn get_database_path() -> Result<PathBuf> {
    let data_dir =
        dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Failed to determine data directory"))?;

    Ok(data_dir.join("learnlog").join("learnlog.db"))
}

/// Ensures the parent directory of the database file exists.
///
/// Creates the directory structure if it doesn't exist using `create_dir_all`.
///
/// # Errors
///
/// Returns an error if directory creation fails.
pub fn ensure_database_directory(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }
    Ok(())
}

/// Creates a course's working folder, including missing parents.
///
/// An empty path means no folder was chosen and is left alone.
///
/// # Errors
///
/// Returns an error if directory creation fails.
pub fn ensure_course_folder(folder_path: &str) -> Result<()> {
    if folder_path.trim().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(folder_path)
        .with_context(|| format!("Failed to create course folder: {folder_path}"))?;
    Ok(())
}

/// Parses comma-separated tags from a string.
///
/// Splits on commas, trims whitespace from each tag, and filters out empty strings.
///
/// # Examples
///
/// ```
/// use learnlog::utils::parse_tags;
///
/// let tags = parse_tags("rust, learning, ");
/// assert_eq!(tags, vec!["rust", "learning"]);
/// ```
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Formats a video duration as `m:ss` or `h:mm:ss`; unknown or zero is `--:--`.
pub fn format_duration(seconds: Option<i64>) -> String {
    let Some(seconds) = seconds.filter(|s| *s > 0) else {
        return "--:--".to_string();
    };
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

/// Formats a total such as a course's remaining time as `1h 5m`, `2h` or `45m`.
pub fn format_total_duration(seconds: i64) -> String {
    let (h, m) = (seconds / 3600, (seconds % 3600) / 60);
    match (h, m) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

/// Turns a course title into a folder name: keeps ASCII letters, digits,
/// `_`, `-` and spaces, joins words with `_` and caps the length at 60.
pub fn sanitize_folder_name(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(*c, '_' | '-' | ' '))
        .collect();
    kept.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .take(60)
        .collect()
}
