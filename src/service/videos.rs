use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::db::{now_timestamp, timestamp_column};
use crate::{CourseId, Database, Video, VideoId, VideoStatus};

pub(crate) const VIDEO_COLUMNS: &str = "id, course_id, source_video_id, title, duration_seconds, position,
     thumbnail_url, status, progress_seconds, notes, created_at, updated_at";

/// Video reads and progress updates.
///
/// Every mutation also refreshes the parent course's `updated_at`, so the
/// recency ordering of courses reflects activity on their videos.
pub struct VideoRepository<'db> {
    db: &'db Database,
}

impl<'db> VideoRepository<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }

    /// Lists a course's videos in playlist order.
    pub fn list_for_course(&self, course_id: CourseId) -> Result<Vec<Video>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos WHERE course_id = ?1 ORDER BY position, id"
        ))?;
        let videos = stmt
            .query_map([course_id.get()], video_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(videos)
    }

    pub fn get(&self, id: VideoId) -> Result<Option<Video>> {
        let video = self
            .db
            .connection()
            .query_row(
                &format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?1"),
                [id.get()],
                video_from_row,
            )
            .optional()?;
        Ok(video)
    }

    /// Changes a video's status with its progress side effects.
    ///
    /// - `Completed` sets progress to the full duration (0 if unknown).
    /// - `NotStarted` resets progress to 0.
    /// - `InProgress` leaves progress untouched.
    pub fn update_status(&self, id: VideoId, status: VideoStatus) -> Result<()> {
        let now = now_timestamp();
        let sql = match status {
            VideoStatus::Completed => {
                "UPDATE videos SET status = ?1, progress_seconds = COALESCE(duration_seconds, 0), updated_at = ?2 WHERE id = ?3"
            }
            VideoStatus::NotStarted => {
                "UPDATE videos SET status = ?1, progress_seconds = 0, updated_at = ?2 WHERE id = ?3"
            }
            VideoStatus::InProgress => {
                "UPDATE videos SET status = ?1, updated_at = ?2 WHERE id = ?3"
            }
        };

        self.db.transaction(|tx| {
            tx.execute(sql, params![status, now, id.get()])?;
            touch_parent_course(tx, id, now)
        })?;

        tracing::debug!(video_id = %id, %status, "video status updated");
        Ok(())
    }

    pub fn update_notes(&self, id: VideoId, notes: &str) -> Result<()> {
        let now = now_timestamp();
        self.db.transaction(|tx| {
            tx.execute(
                "UPDATE videos SET notes = ?1, updated_at = ?2 WHERE id = ?3",
                params![notes, now, id.get()],
            )?;
            touch_parent_course(tx, id, now)
        })
    }

    /// Records the playback position.
    ///
    /// Negative values are stored as 0. The duration is not enforced as an
    /// upper bound, and the status is left as it is.
    pub fn update_progress(&self, id: VideoId, progress_seconds: i64) -> Result<()> {
        let now = now_timestamp();
        self.db.transaction(|tx| {
            tx.execute(
                "UPDATE videos SET progress_seconds = ?1, updated_at = ?2 WHERE id = ?3",
                params![progress_seconds.max(0), now, id.get()],
            )?;
            touch_parent_course(tx, id, now)
        })
    }
}

fn touch_parent_course(conn: &Connection, video_id: VideoId, now: i64) -> Result<()> {
    conn.execute(
        "UPDATE courses SET updated_at = ?1
         WHERE id = (SELECT course_id FROM videos WHERE id = ?2)",
        params![now, video_id.get()],
    )?;
    Ok(())
}

/// Maps a row selected with `VIDEO_COLUMNS`.
pub(crate) fn video_from_row(row: &Row<'_>) -> rusqlite::Result<Video> {
    Ok(Video {
        id: VideoId::new(row.get(0)?),
        course_id: CourseId::new(row.get(1)?),
        source_video_id: row.get(2)?,
        title: row.get(3)?,
        duration_seconds: row.get(4)?,
        position: row.get(5)?,
        thumbnail_url: row.get(6)?,
        status: row.get(7)?,
        progress_seconds: row.get(8)?,
        // Older databases allowed NULL notes
        notes: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
        created_at: timestamp_column(row, 10)?,
        updated_at: timestamp_column(row, 11)?,
    })
}
