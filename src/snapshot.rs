//! Portable snapshot format for exchanging courses between databases.
//!
//! A snapshot is a self-contained JSON document. Its numeric ids only
//! relate records inside the same snapshot; importing remaps them through
//! natural keys (`source_url`, `(course, source_video_id)`, tag name).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

use crate::{Course, CourseTag, Tag, Video};

/// Format version written by this build. Older versions are accepted.
pub const SNAPSHOT_VERSION: u32 = 2;

/// Errors raised while reading a snapshot, before anything is written.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The document does not have the expected top-level shape.
    #[error("invalid snapshot format: {0}")]
    Format(String),

    /// Written by a newer release with a format this build cannot read.
    #[error("unsupported snapshot version {found} (newest supported is {})", SNAPSHOT_VERSION)]
    UnsupportedVersion { found: u64 },

    /// The shape is right but a record could not be decoded.
    #[error("malformed snapshot record: {0}")]
    Record(#[source] serde_json::Error),

    /// The input is not JSON at all.
    #[error("snapshot is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),
}

/// A point-in-time export of selected courses with their videos and tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default = "legacy_version")]
    pub version: u32,
    #[serde(with = "time::serde::rfc3339", default = "OffsetDateTime::now_utc")]
    pub exported_at: OffsetDateTime,
    pub courses: Vec<Course>,
    pub videos: Vec<Video>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub course_tags: Vec<CourseTag>,
}

fn legacy_version() -> u32 {
    1
}

impl Snapshot {
    /// Creates an empty snapshot stamped with the current time.
    pub fn new() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            exported_at: OffsetDateTime::now_utc(),
            courses: Vec::new(),
            videos: Vec::new(),
            tags: Vec::new(),
            course_tags: Vec::new(),
        }
    }

    /// Parses and validates a snapshot from JSON text.
    ///
    /// # Examples
    ///
    /// ```
    /// use learnlog::{Snapshot, SnapshotError};
    ///
    /// let empty = Snapshot::from_json(r#"{"version": 2, "courses": [], "videos": []}"#).unwrap();
    /// assert!(empty.courses.is_empty());
    ///
    /// let missing_videos = Snapshot::from_json(r#"{"courses": []}"#);
    /// assert!(matches!(missing_videos, Err(SnapshotError::Format(_))));
    /// ```
    pub fn from_json(input: &str) -> Result<Self, SnapshotError> {
        let value: Value = serde_json::from_str(input).map_err(SnapshotError::Json)?;
        Self::from_value(value)
    }

    /// Validates the top-level shape of `value`, then decodes it.
    ///
    /// `courses` and `videos` must be arrays; `tags` and `course_tags` are
    /// optional but must be arrays when present.
    pub fn from_value(value: Value) -> Result<Self, SnapshotError> {
        let Some(object) = value.as_object() else {
            return Err(SnapshotError::Format(
                "top level must be a JSON object".to_string(),
            ));
        };

        for key in ["courses", "videos"] {
            if !object.get(key).is_some_and(Value::is_array) {
                return Err(SnapshotError::Format(format!("missing `{key}` array")));
            }
        }
        for key in ["tags", "course_tags"] {
            if object.get(key).is_some_and(|v| !v.is_array()) {
                return Err(SnapshotError::Format(format!("`{key}` must be an array")));
            }
        }

        if let Some(version) = object.get("version") {
            let found = version.as_u64().ok_or_else(|| {
                SnapshotError::Format("`version` must be a non-negative integer".to_string())
            })?;
            if found > u64::from(SNAPSHOT_VERSION) {
                return Err(SnapshotError::UnsupportedVersion { found });
            }
        }

        serde_json::from_value(value).map_err(SnapshotError::Record)
    }

    /// Serializes the snapshot as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(self).map_err(SnapshotError::Json)
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// What an import changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub courses_created: usize,
    pub courses_updated: usize,
    pub videos_created: usize,
    pub videos_updated: usize,
    /// Videos whose course is not part of the snapshot.
    pub videos_skipped: usize,
    /// New course/tag associations; ones that already existed are not counted.
    pub tags_linked: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_value_rejects_non_object() {
        let result = Snapshot::from_value(json!([1, 2, 3]));
        assert!(matches!(result, Err(SnapshotError::Format(_))));
    }

    #[test]
    fn from_value_rejects_missing_courses() {
        let result = Snapshot::from_value(json!({"version": 2, "videos": []}));
        match result {
            Err(SnapshotError::Format(msg)) => assert!(msg.contains("courses")),
            other => panic!("expected format error, got {other:?}"),
        }
    }

    #[test]
    fn from_value_rejects_courses_that_are_not_an_array() {
        let result = Snapshot::from_value(json!({"courses": {}, "videos": []}));
        assert!(matches!(result, Err(SnapshotError::Format(_))));
    }

    #[test]
    fn from_value_rejects_non_array_tags() {
        let result = Snapshot::from_value(json!({"courses": [], "videos": [], "tags": "go"}));
        assert!(matches!(result, Err(SnapshotError::Format(_))));
    }

    #[test]
    fn from_value_rejects_newer_versions() {
        let result = Snapshot::from_value(json!({"version": 3, "courses": [], "videos": []}));
        assert!(matches!(
            result,
            Err(SnapshotError::UnsupportedVersion { found: 3 })
        ));
    }

    #[test]
    fn from_value_accepts_version_one_without_tags() {
        let snapshot = Snapshot::from_value(json!({
            "version": 1,
            "exported_at": "2024-05-01T12:00:00Z",
            "courses": [],
            "videos": []
        }))
        .unwrap();

        assert_eq!(snapshot.version, 1);
        assert!(snapshot.tags.is_empty());
        assert!(snapshot.course_tags.is_empty());
    }

    #[test]
    fn from_value_reports_malformed_records() {
        let result = Snapshot::from_value(json!({
            "courses": [{"id": "not-a-number"}],
            "videos": []
        }));
        assert!(matches!(result, Err(SnapshotError::Record(_))));
    }

    #[test]
    fn from_json_reports_invalid_json() {
        let result = Snapshot::from_json("{not json");
        assert!(matches!(result, Err(SnapshotError::Json(_))));
    }

    #[test]
    fn new_snapshot_serializes_current_version() {
        let json = Snapshot::new().to_json_pretty().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["version"], 2);
        assert!(value["exported_at"].is_string());
        for key in ["courses", "videos", "tags", "course_tags"] {
            assert!(value[key].is_array(), "{key} should be an array");
        }
    }
}
