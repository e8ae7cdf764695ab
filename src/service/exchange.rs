use std::collections::HashMap;

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use super::courses::{COURSE_COLUMNS, course_from_row, next_position_in_group};
use super::tags::{get_or_create_tag, link_course_tag};
use super::videos::{VIDEO_COLUMNS, video_from_row};
use crate::{
    Course, CourseId, CourseTag, Database, ImportSummary, Snapshot, Tag, TagId, Video, VideoId,
};

/// Export and import of snapshots.
///
/// Import reconciles on natural keys: courses by `source_url`, videos by
/// `(course, source_video_id)` and tags by name. Snapshot ids are never
/// written to the database; they only link records within the snapshot.
pub struct SnapshotExchange<'db> {
    db: &'db Database,
}

impl<'db> SnapshotExchange<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }

    /// Reads the given courses with their videos, tag associations and the
    /// tags those associations reference, all from one consistent view.
    ///
    /// Unknown ids are ignored.
    pub fn export(&self, course_ids: &[CourseId]) -> Result<Snapshot> {
        let mut snapshot = Snapshot::new();
        if course_ids.is_empty() {
            return Ok(snapshot);
        }

        let ids: Vec<i64> = course_ids.iter().map(|id| id.get()).collect();
        let placeholders = vec!["?"; ids.len()].join(", ");

        self.db.transaction(|tx| {
            snapshot.courses = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {COURSE_COLUMNS} FROM courses WHERE id IN ({placeholders}) ORDER BY id"
                ))?;
                let courses = stmt
                    .query_map(params_from_iter(ids.iter()), course_from_row)?
                    .collect::<rusqlite::Result<Vec<Course>>>()?;
                courses
            };

            snapshot.videos = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {VIDEO_COLUMNS} FROM videos
                     WHERE course_id IN ({placeholders})
                     ORDER BY course_id, position, id"
                ))?;
                let videos = stmt
                    .query_map(params_from_iter(ids.iter()), video_from_row)?
                    .collect::<rusqlite::Result<Vec<Video>>>()?;
                videos
            };

            snapshot.course_tags = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT course_id, tag_id FROM course_tags
                     WHERE course_id IN ({placeholders})
                     ORDER BY course_id, tag_id"
                ))?;
                let links = stmt
                    .query_map(params_from_iter(ids.iter()), |row| {
                        Ok(CourseTag {
                            course_id: CourseId::new(row.get(0)?),
                            tag_id: TagId::new(row.get(1)?),
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                links
            };

            snapshot.tags = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT DISTINCT t.id, t.name FROM tags t
                     JOIN course_tags ct ON ct.tag_id = t.id
                     WHERE ct.course_id IN ({placeholders})
                     ORDER BY t.id"
                ))?;
                let tags = stmt
                    .query_map(params_from_iter(ids.iter()), |row| {
                        Ok(Tag::new(TagId::new(row.get(0)?), row.get::<_, String>(1)?))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                tags
            };

            Ok(())
        })?;

        tracing::info!(
            courses = snapshot.courses.len(),
            videos = snapshot.videos.len(),
            tags = snapshot.tags.len(),
            "snapshot exported"
        );
        Ok(snapshot)
    }

    /// Merges a snapshot into the database in one transaction.
    ///
    /// - A course whose `source_url` already exists gets its title,
    ///   channel, thumbnail, folder and `updated_at` overwritten; its id,
    ///   playlist id, `created_at` and group membership are kept. Otherwise
    ///   the course is inserted with its original timestamps, ungrouped.
    /// - A video matched by `(course, source_video_id)` only takes status,
    ///   progress, notes and `updated_at` from the snapshot; title,
    ///   duration, position and thumbnail stay as stored locally. Unmatched
    ///   videos are inserted. Videos of courses absent from the snapshot
    ///   are skipped.
    /// - Tags are found or created by name and associations are added
    ///   without removing existing ones.
    ///
    /// Any error rolls the whole import back.
    pub fn import(&self, snapshot: &Snapshot) -> Result<ImportSummary> {
        let summary = self.db.transaction(|tx| {
            let mut summary = ImportSummary::default();

            let mut course_map: HashMap<CourseId, CourseId> = HashMap::new();
            for course in &snapshot.courses {
                let local_id = match find_course_by_url(tx, &course.source_url)? {
                    Some(existing) => {
                        update_imported_course(tx, existing, course)?;
                        summary.courses_updated += 1;
                        existing
                    }
                    None => {
                        let created = insert_imported_course(tx, course)?;
                        summary.courses_created += 1;
                        created
                    }
                };
                course_map.insert(course.id, local_id);
            }

            for video in &snapshot.videos {
                let Some(&course_id) = course_map.get(&video.course_id) else {
                    summary.videos_skipped += 1;
                    continue;
                };
                match find_video(tx, course_id, &video.source_video_id)? {
                    Some(existing) => {
                        update_imported_video(tx, existing, video)?;
                        summary.videos_updated += 1;
                    }
                    None => {
                        insert_imported_video(tx, course_id, video)?;
                        summary.videos_created += 1;
                    }
                }
            }

            let mut tag_map: HashMap<TagId, TagId> = HashMap::new();
            for tag in &snapshot.tags {
                let name = tag.name.trim();
                if name.is_empty() {
                    continue;
                }
                tag_map.insert(tag.id, get_or_create_tag(tx, name)?);
            }

            for link in &snapshot.course_tags {
                let (Some(&course_id), Some(&tag_id)) =
                    (course_map.get(&link.course_id), tag_map.get(&link.tag_id))
                else {
                    continue;
                };
                if link_course_tag(tx, course_id, tag_id)? {
                    summary.tags_linked += 1;
                }
            }

            Ok(summary)
        })?;

        tracing::info!(?summary, "snapshot imported");
        Ok(summary)
    }
}

fn find_course_by_url(conn: &Connection, source_url: &str) -> Result<Option<CourseId>> {
    let id = conn
        .query_row(
            "SELECT id FROM courses WHERE source_url = ?1 ORDER BY id LIMIT 1",
            [source_url],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id.map(CourseId::new))
}

fn update_imported_course(conn: &Connection, id: CourseId, course: &Course) -> Result<()> {
    conn.execute(
        "UPDATE courses
         SET title = ?1, channel = ?2, thumbnail_url = ?3, local_folder_path = ?4, updated_at = ?5
         WHERE id = ?6",
        params![
            course.title,
            course.channel,
            course.thumbnail_url,
            course.local_folder_path,
            course.updated_at.unix_timestamp(),
            id.get(),
        ],
    )?;
    Ok(())
}

fn insert_imported_course(conn: &Connection, course: &Course) -> Result<CourseId> {
    // Snapshot group ids are not portable, so imported courses start ungrouped
    let position = next_position_in_group(conn, None)?;
    conn.execute(
        "INSERT INTO courses (title, channel, source_playlist_id, source_url, thumbnail_url,
                              local_folder_path, group_id, position_in_group, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?8, ?9)",
        params![
            course.title,
            course.channel,
            course.source_playlist_id,
            course.source_url,
            course.thumbnail_url,
            course.local_folder_path,
            position,
            course.created_at.unix_timestamp(),
            course.updated_at.unix_timestamp(),
        ],
    )?;
    Ok(CourseId::new(conn.last_insert_rowid()))
}

fn find_video(conn: &Connection, course_id: CourseId, source_video_id: &str) -> Result<Option<VideoId>> {
    let id = conn
        .query_row(
            "SELECT id FROM videos WHERE course_id = ?1 AND source_video_id = ?2 ORDER BY id LIMIT 1",
            params![course_id.get(), source_video_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id.map(VideoId::new))
}

fn update_imported_video(conn: &Connection, id: VideoId, video: &Video) -> Result<()> {
    // Metadata (title, duration, position, thumbnail) is deliberately left as stored
    conn.execute(
        "UPDATE videos SET status = ?1, progress_seconds = ?2, notes = ?3, updated_at = ?4
         WHERE id = ?5",
        params![
            video.status,
            video.progress_seconds,
            video.notes,
            video.updated_at.unix_timestamp(),
            id.get(),
        ],
    )?;
    Ok(())
}

fn insert_imported_video(conn: &Connection, course_id: CourseId, video: &Video) -> Result<()> {
    conn.execute(
        "INSERT INTO videos (course_id, source_video_id, title, duration_seconds, position, thumbnail_url,
                             status, progress_seconds, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            course_id.get(),
            video.source_video_id,
            video.title,
            video.duration_seconds,
            video.position,
            video.thumbnail_url,
            video.status,
            video.progress_seconds,
            video.notes,
            video.created_at.unix_timestamp(),
            video.updated_at.unix_timestamp(),
        ],
    )?;
    Ok(())
}
