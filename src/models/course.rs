use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{CourseId, GroupId, NewVideo};

/// A tracked course: one imported playlist or single video.
///
/// `source_url` is the identity used when reconciling snapshots across
/// databases; `id` is only meaningful locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub channel: Option<String>,
    pub source_playlist_id: Option<String>,
    pub source_url: String,
    pub thumbnail_url: Option<String>,
    /// Working folder for exercises; empty when unset.
    #[serde(default)]
    pub local_folder_path: String,
    #[serde(default)]
    pub group_id: Option<GroupId>,
    /// Ordering among the courses sharing `group_id` (or among ungrouped courses).
    #[serde(default)]
    pub position_in_group: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Video counts for one course, aggregated on read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseStats {
    pub total_videos: i64,
    pub completed_videos: i64,
    pub in_progress_videos: i64,
}

impl CourseStats {
    /// Videos neither completed nor in progress.
    pub fn not_started_videos(&self) -> i64 {
        self.total_videos - self.completed_videos - self.in_progress_videos
    }

    /// Completed share as a rounded percentage; 0 for an empty course.
    ///
    /// # Examples
    ///
    /// ```
    /// use learnlog::CourseStats;
    ///
    /// let stats = CourseStats { total_videos: 3, completed_videos: 2, in_progress_videos: 0 };
    /// assert_eq!(stats.completion_percent(), 67);
    /// assert_eq!(CourseStats::default().completion_percent(), 0);
    /// ```
    pub fn completion_percent(&self) -> u8 {
        if self.total_videos <= 0 {
            return 0;
        }
        let percent = (self.completed_videos as f64 / self.total_videos as f64) * 100.0;
        percent.round().clamp(0.0, 100.0) as u8
    }

    /// True when every video of a non-empty course is completed.
    pub fn is_complete(&self) -> bool {
        self.total_videos > 0 && self.completed_videos == self.total_videos
    }
}

/// A course together with its aggregated video counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseWithStats {
    #[serde(flatten)]
    pub course: Course,
    #[serde(flatten)]
    pub stats: CourseStats,
}

/// Payload for creating a course along with its initial videos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCourse {
    pub title: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub source_playlist_id: Option<String>,
    pub source_url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub local_folder_path: String,
    #[serde(default)]
    pub videos: Vec<NewVideo>,
}

impl NewCourse {
    /// Creates a payload with only the required fields set.
    pub fn new(title: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            channel: None,
            source_playlist_id: None,
            source_url: source_url.into(),
            thumbnail_url: None,
            local_folder_path: String::new(),
            videos: Vec::new(),
        }
    }

    /// Appends a video after the ones already present. Positions start at 1.
    pub fn with_video(
        mut self,
        source_video_id: impl Into<String>,
        title: impl Into<String>,
        duration_seconds: Option<i64>,
    ) -> Self {
        let position = self.videos.len() as i64 + 1;
        self.videos.push(NewVideo {
            source_video_id: source_video_id.into(),
            title: title.into(),
            duration_seconds,
            position,
            thumbnail_url: None,
        });
        self
    }
}
