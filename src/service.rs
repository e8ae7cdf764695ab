mod courses;
mod exchange;
mod groups;
mod stats;
mod tags;
mod videos;

pub use courses::{CourseOrder, CourseRepository, ListCoursesOptions};
pub use exchange::SnapshotExchange;
pub use groups::GroupRepository;
pub use stats::StatsRepository;
pub use tags::TagRepository;
pub use videos::VideoRepository;

use anyhow::Result;

use crate::Database;

/// Entry point to every tracker operation.
///
/// `Tracker` owns the storage handle and lends it to short-lived
/// repositories, one per entity. It is UI-independent and is driven by
/// the CLI as well as the command surface.
///
/// # Examples
///
/// ```
/// use learnlog::{Database, NewCourse, Tracker};
///
/// # fn main() -> anyhow::Result<()> {
/// let tracker = Tracker::new(Database::in_memory()?);
///
/// let id = tracker.courses().create(
///     &NewCourse::new("Rust in Action", "https://www.youtube.com/playlist?list=PL1")
///         .with_video("v1", "Ownership", Some(600)),
/// )?;
///
/// let course = tracker.courses().get(id)?.expect("course should exist");
/// assert_eq!(course.stats.total_videos, 1);
/// # Ok(())
/// # }
/// ```
pub struct Tracker {
    db: Database,
}

impl Tracker {
    /// Creates a tracker over an already opened database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns a reference to the underlying database.
    ///
    /// Useful for testing or advanced operations that need direct database access.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Releases the tracker and closes its database.
    pub fn close(self) -> Result<()> {
        self.db.close()
    }

    pub fn courses(&self) -> CourseRepository<'_> {
        CourseRepository::new(&self.db)
    }

    pub fn videos(&self) -> VideoRepository<'_> {
        VideoRepository::new(&self.db)
    }

    pub fn tags(&self) -> TagRepository<'_> {
        TagRepository::new(&self.db)
    }

    pub fn groups(&self) -> GroupRepository<'_> {
        GroupRepository::new(&self.db)
    }

    pub fn snapshots(&self) -> SnapshotExchange<'_> {
        SnapshotExchange::new(&self.db)
    }

    pub fn stats(&self) -> StatsRepository<'_> {
        StatsRepository::new(&self.db)
    }
}
