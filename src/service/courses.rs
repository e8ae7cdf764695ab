use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use crate::db::{now_timestamp, timestamp_column};
use crate::{Course, CourseId, CourseStats, CourseWithStats, Database, GroupId, NewCourse};

/// Course columns followed by the three aggregated video counts.
const COURSE_WITH_STATS_SELECT: &str = "
    SELECT
        c.id, c.title, c.channel, c.source_playlist_id, c.source_url, c.thumbnail_url,
        c.local_folder_path, c.group_id, c.position_in_group, c.created_at, c.updated_at,
        COUNT(v.id),
        COALESCE(SUM(CASE WHEN v.status = 'completed' THEN 1 ELSE 0 END), 0),
        COALESCE(SUM(CASE WHEN v.status = 'in_progress' THEN 1 ELSE 0 END), 0)
    FROM courses c
    LEFT JOIN videos v ON v.course_id = c.id
    LEFT JOIN course_groups g ON g.id = c.group_id";

pub(crate) const COURSE_COLUMNS: &str = "id, title, channel, source_playlist_id, source_url, thumbnail_url,
     local_folder_path, group_id, position_in_group, created_at, updated_at";

/// Sort order for course listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CourseOrder {
    /// Most recently updated first, including updates to the course's videos.
    #[default]
    RecentlyUpdated,
    /// Groups in their user-defined order, courses by position inside each
    /// group; ungrouped courses last.
    GroupPosition,
}

/// Options for filtering and ordering course lists.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListCoursesOptions {
    /// Case-insensitive substring matched against title and channel.
    pub search: Option<String>,
    /// Only courses carrying this tag (case-insensitive).
    pub tag: Option<String>,
    pub order: CourseOrder,
}

/// Course CRUD and aggregate reads.
pub struct CourseRepository<'db> {
    db: &'db Database,
}

impl<'db> CourseRepository<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }

    /// Lists every course with its video counts.
    pub fn list_all(&self) -> Result<Vec<CourseWithStats>> {
        self.list(ListCoursesOptions::default())
    }

    /// Lists courses matching `options`, each with its video counts.
    pub fn list(&self, options: ListCoursesOptions) -> Result<Vec<CourseWithStats>> {
        let mut sql = COURSE_WITH_STATS_SELECT.to_string();
        let mut conditions = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(search) = options.search.as_deref().map(str::trim)
            && !search.is_empty()
        {
            values.push(format!("%{}%", escape_like(search)));
            let n = values.len();
            conditions.push(format!(
                "(c.title LIKE ?{n} ESCAPE '\\' OR c.channel LIKE ?{n} ESCAPE '\\')"
            ));
        }

        if let Some(tag) = options.tag.as_deref().map(str::trim)
            && !tag.is_empty()
        {
            values.push(tag.to_string());
            let n = values.len();
            conditions.push(format!(
                "c.id IN (SELECT ct.course_id FROM course_tags ct
                          JOIN tags t ON t.id = ct.tag_id
                          WHERE t.name = ?{n})"
            ));
        }

        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        sql.push_str(" GROUP BY c.id");
        sql.push_str(match options.order {
            CourseOrder::RecentlyUpdated => " ORDER BY c.updated_at DESC, c.id DESC",
            CourseOrder::GroupPosition => {
                " ORDER BY g.position IS NULL, g.position, c.position_in_group, c.id"
            }
        });

        let conn = self.db.connection();
        let mut stmt = conn.prepare(&sql)?;
        let courses = stmt
            .query_map(params_from_iter(values.iter()), course_with_stats_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(courses)
    }

    /// Lists the courses of one group (or the ungrouped ones) in their
    /// user-defined order.
    pub fn list_in_group(&self, group_id: Option<GroupId>) -> Result<Vec<CourseWithStats>> {
        let sql = format!(
            "{COURSE_WITH_STATS_SELECT}
             WHERE c.group_id IS ?1
             GROUP BY c.id
             ORDER BY c.position_in_group, c.id"
        );

        let conn = self.db.connection();
        let mut stmt = conn.prepare(&sql)?;
        let courses = stmt
            .query_map([group_id.map(GroupId::get)], course_with_stats_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(courses)
    }

    /// Retrieves a course with its video counts.
    ///
    /// Returns `None` if no course exists with the given ID.
    pub fn get(&self, id: CourseId) -> Result<Option<CourseWithStats>> {
        let sql = format!("{COURSE_WITH_STATS_SELECT} WHERE c.id = ?1 GROUP BY c.id");

        let course = self
            .db
            .connection()
            .query_row(&sql, [id.get()], course_with_stats_from_row)
            .optional()?;

        Ok(course)
    }

    /// Creates a course and its initial videos in one transaction.
    ///
    /// The new course is ungrouped and placed after the existing ungrouped
    /// courses. Every video starts as not started with no progress.
    pub fn create(&self, new_course: &NewCourse) -> Result<CourseId> {
        let now = now_timestamp();

        let id = self.db.transaction(|tx| {
            let position = next_position_in_group(tx, None)?;

            tx.execute(
                "INSERT INTO courses (title, channel, source_playlist_id, source_url, thumbnail_url,
                                      local_folder_path, group_id, position_in_group, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?8, ?8)",
                params![
                    new_course.title,
                    new_course.channel,
                    new_course.source_playlist_id,
                    new_course.source_url,
                    new_course.thumbnail_url,
                    new_course.local_folder_path,
                    position,
                    now,
                ],
            )?;
            let course_id = tx.last_insert_rowid();

            let mut insert = tx.prepare(
                "INSERT INTO videos (course_id, source_video_id, title, duration_seconds, position,
                                     thumbnail_url, status, progress_seconds, notes, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'not_started', 0, '', ?7, ?7)",
            )?;
            for video in &new_course.videos {
                insert.execute(params![
                    course_id,
                    video.source_video_id,
                    video.title,
                    video.duration_seconds,
                    video.position,
                    video.thumbnail_url,
                    now,
                ])?;
            }

            Ok(CourseId::new(course_id))
        })?;

        tracing::info!(
            course_id = %id,
            videos = new_course.videos.len(),
            "course created"
        );
        Ok(id)
    }

    /// Deletes a course.
    ///
    /// Its videos and tag associations go with it; the tags themselves
    /// remain. The courses left in its group close the gap. Deleting a
    /// non-existent course is not an error.
    pub fn delete(&self, id: CourseId) -> Result<()> {
        self.db.transaction(|tx| {
            let group_id: Option<Option<i64>> = tx
                .query_row(
                    "SELECT group_id FROM courses WHERE id = ?1",
                    [id.get()],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(group_id) = group_id else {
                return Ok(());
            };

            tx.execute("DELETE FROM courses WHERE id = ?1", [id.get()])?;
            renumber_courses_in_group(tx, group_id.map(GroupId::new))?;
            tracing::info!(course_id = %id, "course deleted");
            Ok(())
        })
    }

    pub fn update_folder_path(&self, id: CourseId, folder_path: &str) -> Result<()> {
        self.db.connection().execute(
            "UPDATE courses SET local_folder_path = ?1, updated_at = ?2 WHERE id = ?3",
            params![folder_path, now_timestamp(), id.get()],
        )?;
        Ok(())
    }

    pub fn update_title(&self, id: CourseId, title: &str) -> Result<()> {
        self.db.connection().execute(
            "UPDATE courses SET title = ?1, updated_at = ?2 WHERE id = ?3",
            params![title, now_timestamp(), id.get()],
        )?;
        Ok(())
    }

    /// Moves a course into a group (or out of all groups with `None`),
    /// placing it last there.
    ///
    /// The group is not checked up front: a missing group fails the
    /// foreign-key constraint. Moving a course into the group it already
    /// belongs to keeps its position. The group it leaves is renumbered
    /// so positions stay dense. Filing a course does not count as
    /// activity, so `updated_at` is left alone.
    pub fn set_group(&self, id: CourseId, group_id: Option<GroupId>) -> Result<()> {
        self.db.transaction(|tx| {
            let current: Option<Option<i64>> = tx
                .query_row(
                    "SELECT group_id FROM courses WHERE id = ?1",
                    [id.get()],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(current) = current else {
                return Ok(());
            };
            if current == group_id.map(GroupId::get) {
                return Ok(());
            }

            let position = next_position_in_group(tx, group_id)?;
            tx.execute(
                "UPDATE courses SET group_id = ?1, position_in_group = ?2 WHERE id = ?3",
                params![group_id.map(GroupId::get), position, id.get()],
            )?;
            renumber_courses_in_group(tx, current.map(GroupId::new))?;
            Ok(())
        })
    }

    /// Assigns `position_in_group = index` to each course in `ordered_ids`,
    /// all in one transaction.
    pub fn reorder_within_group(&self, ordered_ids: &[CourseId]) -> Result<()> {
        self.db.transaction(|tx| {
            let mut update =
                tx.prepare("UPDATE courses SET position_in_group = ?1 WHERE id = ?2")?;
            for (index, id) in ordered_ids.iter().enumerate() {
                update.execute(params![index as i64, id.get()])?;
            }
            Ok(())
        })
    }
}

/// Position just past the last course of `group_id` (`None` = ungrouped).
pub(crate) fn next_position_in_group(conn: &Connection, group_id: Option<GroupId>) -> Result<i64> {
    let position = conn.query_row(
        "SELECT COALESCE(MAX(position_in_group), -1) + 1 FROM courses WHERE group_id IS ?1",
        [group_id.map(GroupId::get)],
        |row| row.get(0),
    )?;
    Ok(position)
}

/// Rewrites `position_in_group` as 0..n for one group (or the ungrouped
/// courses with `None`), keeping their current order.
pub(crate) fn renumber_courses_in_group(conn: &Connection, group_id: Option<GroupId>) -> Result<()> {
    let ids: Vec<i64> = {
        let mut stmt = conn.prepare(
            "SELECT id FROM courses WHERE group_id IS ?1 ORDER BY position_in_group, id",
        )?;
        let ids = stmt
            .query_map([group_id.map(GroupId::get)], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        ids
    };

    let mut update = conn.prepare("UPDATE courses SET position_in_group = ?1 WHERE id = ?2")?;
    for (index, id) in ids.iter().enumerate() {
        update.execute(params![index as i64, id])?;
    }
    Ok(())
}

/// Maps a row selected with `COURSE_COLUMNS`, starting at column 0.
pub(crate) fn course_from_row(row: &Row<'_>) -> rusqlite::Result<Course> {
    Ok(Course {
        id: CourseId::new(row.get(0)?),
        title: row.get(1)?,
        channel: row.get(2)?,
        source_playlist_id: row.get(3)?,
        source_url: row.get(4)?,
        thumbnail_url: row.get(5)?,
        local_folder_path: row.get(6)?,
        group_id: row.get::<_, Option<i64>>(7)?.map(GroupId::new),
        position_in_group: row.get(8)?,
        created_at: timestamp_column(row, 9)?,
        updated_at: timestamp_column(row, 10)?,
    })
}

fn course_with_stats_from_row(row: &Row<'_>) -> rusqlite::Result<CourseWithStats> {
    Ok(CourseWithStats {
        course: course_from_row(row)?,
        stats: CourseStats {
            total_videos: row.get(11)?,
            completed_videos: row.get(12)?,
            in_progress_videos: row.get(13)?,
        },
    })
}

/// Escapes LIKE wildcards so user input matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("100%_done\\"), "100\\%\\_done\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
