use anyhow::Result;

use crate::{CourseId, CourseProgress, Database, DashboardStats};

/// Read-side aggregates computed from raw course and video state.
pub struct StatsRepository<'db> {
    db: &'db Database,
}

impl<'db> StatsRepository<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }

    /// Counts courses and videos by status in a single query.
    pub fn dashboard(&self) -> Result<DashboardStats> {
        let stats = self.db.connection().query_row(
            "SELECT
                (SELECT COUNT(*) FROM courses),
                COUNT(*),
                COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'in_progress' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'not_started' THEN 1 ELSE 0 END), 0)
             FROM videos",
            [],
            |row| {
                Ok(DashboardStats {
                    total_courses: row.get(0)?,
                    total_videos: row.get(1)?,
                    completed_videos: row.get(2)?,
                    in_progress_videos: row.get(3)?,
                    not_started_videos: row.get(4)?,
                })
            },
        )?;
        Ok(stats)
    }

    /// Video counts and watch time for one course.
    ///
    /// Remaining time only counts videos that are not completed, and for
    /// each of them only the part past the saved progress. An unknown
    /// course yields all zeros.
    pub fn course_progress(&self, course_id: CourseId) -> Result<CourseProgress> {
        let progress = self.db.connection().query_row(
            "SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'in_progress' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(COALESCE(duration_seconds, 0)), 0),
                COALESCE(SUM(CASE WHEN status != 'completed'
                    THEN MAX(0, COALESCE(duration_seconds, 0) - progress_seconds)
                    ELSE 0 END), 0)
             FROM videos
             WHERE course_id = ?1",
            [course_id.get()],
            |row| {
                Ok(CourseProgress {
                    total_videos: row.get(0)?,
                    completed_videos: row.get(1)?,
                    in_progress_videos: row.get(2)?,
                    total_duration_seconds: row.get(3)?,
                    remaining_seconds: row.get(4)?,
                })
            },
        )?;
        Ok(progress)
    }
}
