use anyhow::Result;
use rusqlite::{Connection, params};

use crate::{CourseId, Database, Tag, TagId};

/// Tag reads and the full-replace assignment of a course's tags.
pub struct TagRepository<'db> {
    db: &'db Database,
}

impl<'db> TagRepository<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }

    /// Lists every tag by name, including tags no course uses any more.
    pub fn list_all(&self) -> Result<Vec<Tag>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare("SELECT id, name FROM tags ORDER BY name, id")?;
        let tags = stmt
            .query_map([], |row| Ok(Tag::new(TagId::new(row.get(0)?), row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }

    pub fn list_for_course(&self, course_id: CourseId) -> Result<Vec<Tag>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare(
            "SELECT t.id, t.name FROM tags t
             JOIN course_tags ct ON ct.tag_id = t.id
             WHERE ct.course_id = ?1
             ORDER BY t.name, t.id",
        )?;
        let tags = stmt
            .query_map([course_id.get()], |row| {
                Ok(Tag::new(TagId::new(row.get(0)?), row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }

    /// Looks up a tag by name (case-insensitive), creating it if missing.
    pub fn get_or_create(&self, name: &str) -> Result<TagId> {
        get_or_create_tag(self.db.connection(), name.trim())
    }

    /// Replaces the course's tag set with `names`.
    ///
    /// Names are trimmed and blanks skipped. Names differing only in case
    /// resolve to the same tag, and duplicates collapse into one
    /// association. Runs as one transaction: a failure (for example an
    /// unknown course) leaves the previous tags in place.
    ///
    /// # Examples
    ///
    /// ```
    /// use learnlog::{Database, NewCourse, Tracker};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let tracker = Tracker::new(Database::in_memory()?);
    /// let id = tracker.courses().create(&NewCourse::new("Go", "https://example.com/go"))?;
    ///
    /// tracker.tags().replace_for_course(id, &["Go", "go", " Go ", ""])?;
    ///
    /// let tags = tracker.tags().list_for_course(id)?;
    /// assert_eq!(tags.len(), 1);
    /// assert_eq!(tags[0].name, "Go");
    /// # Ok(())
    /// # }
    /// ```
    pub fn replace_for_course<S: AsRef<str>>(&self, course_id: CourseId, names: &[S]) -> Result<()> {
        self.db.transaction(|tx| {
            tx.execute(
                "DELETE FROM course_tags WHERE course_id = ?1",
                [course_id.get()],
            )?;

            for name in names {
                let trimmed = name.as_ref().trim();
                if trimmed.is_empty() {
                    continue;
                }
                let tag_id = get_or_create_tag(tx, trimmed)?;
                link_course_tag(tx, course_id, tag_id)?;
            }
            Ok(())
        })?;

        tracing::debug!(course_id = %course_id, count = names.len(), "course tags replaced");
        Ok(())
    }
}

/// Finds the tag named `name` (case-insensitive) or inserts it.
pub(crate) fn get_or_create_tag(conn: &Connection, name: &str) -> Result<TagId> {
    conn.execute(
        "INSERT INTO tags (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
        [name],
    )?;
    let id: i64 = conn.query_row("SELECT id FROM tags WHERE name = ?1", [name], |row| {
        row.get(0)
    })?;
    Ok(TagId::new(id))
}

/// Links a course to a tag; an existing link is left alone.
///
/// Returns whether a new association was created.
pub(crate) fn link_course_tag(conn: &Connection, course_id: CourseId, tag_id: TagId) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO course_tags (course_id, tag_id) VALUES (?1, ?2)",
        params![course_id.get(), tag_id.get()],
    )?;
    Ok(inserted > 0)
}
