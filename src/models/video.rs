use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use thiserror::Error;
use time::OffsetDateTime;

use super::{CourseId, VideoId};

/// Completion state of a single video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl VideoStatus {
    /// The stored and serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the three known statuses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid video status: {0:?} (expected not_started, in_progress or completed)")]
pub struct ParseStatusError(pub String);

impl FromStr for VideoStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

impl ToSql for VideoStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for VideoStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// One unit of a course with its own progress and notes.
///
/// `(course_id, source_video_id)` identifies a video across databases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub id: VideoId,
    pub course_id: CourseId,
    pub source_video_id: String,
    pub title: String,
    pub duration_seconds: Option<i64>,
    #[serde(default)]
    pub position: i64,
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub status: VideoStatus,
    #[serde(default)]
    pub progress_seconds: i64,
    #[serde(default)]
    pub notes: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Video {
    /// Link that opens the video, resuming at the saved position when the
    /// video has been started but not finished.
    ///
    /// # Examples
    ///
    /// ```
    /// use learnlog::{CourseId, Video, VideoId, VideoStatus};
    /// use time::OffsetDateTime;
    ///
    /// let video = Video {
    ///     id: VideoId::new(1),
    ///     course_id: CourseId::new(1),
    ///     source_video_id: "dQw4w9WgXcQ".to_string(),
    ///     title: "Intro".to_string(),
    ///     duration_seconds: Some(212),
    ///     position: 0,
    ///     thumbnail_url: None,
    ///     status: VideoStatus::InProgress,
    ///     progress_seconds: 42,
    ///     notes: String::new(),
    ///     created_at: OffsetDateTime::UNIX_EPOCH,
    ///     updated_at: OffsetDateTime::UNIX_EPOCH,
    /// };
    /// assert_eq!(video.watch_url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s");
    /// ```
    pub fn watch_url(&self) -> String {
        let mut url = format!("https://www.youtube.com/watch?v={}", self.source_video_id);
        if self.progress_seconds > 0 && self.status != VideoStatus::Completed {
            url.push_str(&format!("&t={}s", self.progress_seconds));
        }
        url
    }
}

/// A video as supplied when a course is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVideo {
    pub source_video_id: String,
    pub title: String,
    #[serde(default)]
    pub duration_seconds: Option<i64>,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}
