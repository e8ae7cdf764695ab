use serde::{Deserialize, Serialize};

/// Global counts shown on the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_courses: i64,
    pub total_videos: i64,
    pub completed_videos: i64,
    pub in_progress_videos: i64,
    pub not_started_videos: i64,
}

/// Per-course counts plus watch-time figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseProgress {
    pub total_videos: i64,
    pub completed_videos: i64,
    pub in_progress_videos: i64,
    /// Sum of known durations; videos without a duration count as 0.
    pub total_duration_seconds: i64,
    /// Unwatched time left across videos that are not completed.
    pub remaining_seconds: i64,
}
