//! Architecture Validation Integration Tests
//!
//! Confirms that the tracker and every library type can be used without any
//! CLI dependencies (clap, dirs), so another front end can drive the same
//! core.
//!
//! This file must NOT import anything from main.rs. It only uses types
//! exported from the `learnlog::` crate root and its public modules.

use anyhow::Result;
use learnlog::playlist::PlaylistInfo;
use learnlog::utils::{format_duration, format_total_duration};
use learnlog::{
    CourseGroup, CourseId, CourseOrder, CourseWithStats, Database, ListCoursesOptions, NewCourse,
    Tag, Tracker, Video, VideoStatus,
};
use tempfile::tempdir;

fn create_test_tracker() -> Tracker {
    let db = Database::in_memory().expect("failed to create in-memory database");
    Tracker::new(db)
}

// =============================================================================
// Tracker isolation
// =============================================================================

#[test]
fn test_tracker_instantiates_without_cli_context() {
    let tracker = create_test_tracker();
    let conn = tracker.database().connection();

    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table'
             AND name IN ('courses', 'videos', 'tags', 'course_tags', 'course_groups')",
            [],
            |row| row.get(0),
        )
        .expect("failed to query schema");

    assert_eq!(count, 5);
}

#[test]
fn test_on_disk_database_persists_across_reopen() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("nested").join("learnlog.db");
    learnlog::utils::ensure_database_directory(&path)?;

    let tracker = Tracker::new(Database::open(&path)?);
    let id = tracker
        .courses()
        .create(&NewCourse::new("Persistent", "https://example.com/p"))?;
    tracker.close()?;

    let reopened = Tracker::new(Database::open(&path)?);
    let course = reopened.courses().get(id)?;
    assert_eq!(course.map(|c| c.course.title), Some("Persistent".to_string()));
    Ok(())
}

// =============================================================================
// Playlist metadata to tracked course
// =============================================================================

#[test]
fn test_playlist_metadata_becomes_course() -> Result<()> {
    let tracker = create_test_tracker();
    let info = PlaylistInfo::from_json(
        r#"{
            "_type": "playlist",
            "id": "PLxyz",
            "title": "Databases",
            "uploader": "CMU",
            "entries": [
                {"id": "d1", "title": "Relational Model", "duration": 4510.6},
                {"id": "d2", "title": "SQL", "duration": 4200}
            ]
        }"#,
    )?;

    let id = tracker.courses().create(&info.into_new_course(""))?;

    let course: CourseWithStats = tracker.courses().get(id)?.expect("course should exist");
    assert_eq!(course.course.channel.as_deref(), Some("CMU"));
    assert_eq!(course.course.source_playlist_id.as_deref(), Some("PLxyz"));

    let videos: Vec<Video> = tracker.videos().list_for_course(id)?;
    assert_eq!(videos[0].duration_seconds, Some(4511));
    assert_eq!(format_duration(videos[0].duration_seconds), "1:15:11");
    assert_eq!(
        videos[1].thumbnail_url.as_deref(),
        Some("https://i.ytimg.com/vi/d2/hqdefault.jpg")
    );
    Ok(())
}

// =============================================================================
// Reads a front end needs
// =============================================================================

#[test]
fn test_watch_url_resumes_in_progress_video() -> Result<()> {
    let tracker = create_test_tracker();
    let id = tracker.courses().create(
        &NewCourse::new("Resume", "https://example.com/r").with_video("abc", "Talk", Some(1800)),
    )?;
    let video = tracker.videos().list_for_course(id)?.remove(0);
    tracker.videos().update_status(video.id, VideoStatus::InProgress)?;
    tracker.videos().update_progress(video.id, 95)?;

    let video = tracker.videos().get(video.id)?.expect("video should exist");
    assert_eq!(video.watch_url(), "https://www.youtube.com/watch?v=abc&t=95s");

    let progress = tracker.stats().course_progress(id)?;
    assert_eq!(format_total_duration(progress.remaining_seconds), "28m");
    Ok(())
}

#[test]
fn test_sidebar_listing_uses_group_order() -> Result<()> {
    let tracker = create_test_tracker();
    let group = tracker.groups().create("Pinned")?;
    let loose: CourseId = tracker
        .courses()
        .create(&NewCourse::new("Loose", "https://example.com/loose"))?;
    let pinned = tracker
        .courses()
        .create(&NewCourse::new("Pinned course", "https://example.com/pinned"))?;
    tracker.courses().set_group(pinned, Some(group))?;
    tracker.tags().replace_for_course(pinned, &["favorite"])?;

    let listed: Vec<CourseId> = tracker
        .courses()
        .list(ListCoursesOptions {
            order: CourseOrder::GroupPosition,
            ..Default::default()
        })?
        .into_iter()
        .map(|c| c.course.id)
        .collect();
    assert_eq!(listed, vec![pinned, loose]);

    let groups: Vec<CourseGroup> = tracker.groups().list_all()?;
    assert_eq!(groups.len(), 1);
    let tags: Vec<Tag> = tracker.tags().list_all()?;
    assert_eq!(tags[0].name, "favorite");
    Ok(())
}
