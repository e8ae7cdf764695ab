pub mod commands;
pub mod config;
pub mod db;
mod models;
pub mod playlist;
mod service;
pub mod snapshot;
pub mod utils;

pub use db::Database;
pub use models::{
    Course, CourseGroup, CourseId, CourseProgress, CourseStats, CourseTag, CourseWithStats,
    DashboardStats, GroupId, NewCourse, NewVideo, ParseStatusError, Tag, TagId, Video, VideoId,
    VideoStatus,
};
pub use service::{
    CourseOrder, CourseRepository, GroupRepository, ListCoursesOptions, SnapshotExchange,
    StatsRepository, TagRepository, Tracker, VideoRepository,
};
pub use snapshot::{ImportSummary, SNAPSHOT_VERSION, Snapshot, SnapshotError};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_accessible_from_crate_root() {
        let db = Database::in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn types_accessible_from_crate_root() {
        let tag = Tag::new(TagId::new(1), "rust");
        assert_eq!(tag.name, "rust");

        let status: VideoStatus = "in_progress".parse().unwrap();
        assert_eq!(format!("{}", status), "in_progress");

        let course = NewCourse::new("Course", "https://example.com").with_video("v1", "One", None);
        assert_eq!(course.videos[0].position, 1);

        assert_eq!(Snapshot::new().version, SNAPSHOT_VERSION);
    }
}
