use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::courses::next_position_in_group;
use crate::db::{now_timestamp, timestamp_column};
use crate::{CourseGroup, Database, GroupId};

const GROUP_COLUMNS: &str = "id, name, position, collapsed, created_at, updated_at";

/// Course groups and their ordering.
///
/// Group positions stay dense and zero-based: creation appends, deletion
/// closes the gap, and reordering renumbers from an explicit id list.
pub struct GroupRepository<'db> {
    db: &'db Database,
}

impl<'db> GroupRepository<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }

    pub fn list_all(&self) -> Result<Vec<CourseGroup>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare(&format!(
            "SELECT {GROUP_COLUMNS} FROM course_groups ORDER BY position, id"
        ))?;
        let groups = stmt
            .query_map([], group_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(groups)
    }

    pub fn get(&self, id: GroupId) -> Result<Option<CourseGroup>> {
        let group = self
            .db
            .connection()
            .query_row(
                &format!("SELECT {GROUP_COLUMNS} FROM course_groups WHERE id = ?1"),
                [id.get()],
                group_from_row,
            )
            .optional()?;
        Ok(group)
    }

    /// Creates an expanded group after all existing groups.
    pub fn create(&self, name: &str) -> Result<GroupId> {
        let now = now_timestamp();
        let id = self.db.transaction(|tx| {
            let position: i64 = tx.query_row(
                "SELECT COALESCE(MAX(position), -1) + 1 FROM course_groups",
                [],
                |row| row.get(0),
            )?;
            tx.execute(
                "INSERT INTO course_groups (name, position, collapsed, created_at, updated_at)
                 VALUES (?1, ?2, 0, ?3, ?3)",
                params![name, position, now],
            )?;
            Ok(GroupId::new(tx.last_insert_rowid()))
        })?;

        tracing::info!(group_id = %id, name, "group created");
        Ok(id)
    }

    pub fn rename(&self, id: GroupId, name: &str) -> Result<()> {
        self.db.connection().execute(
            "UPDATE course_groups SET name = ?1, updated_at = ?2 WHERE id = ?3",
            params![name, now_timestamp(), id.get()],
        )?;
        Ok(())
    }

    /// Deletes a group without deleting its courses.
    ///
    /// The group's courses become ungrouped, keeping their relative order
    /// after the courses that were already ungrouped. Remaining groups are
    /// renumbered densely. All of it happens in one transaction.
    pub fn delete(&self, id: GroupId) -> Result<()> {
        self.db.transaction(|tx| {
            let members: Vec<i64> = {
                let mut stmt = tx.prepare(
                    "SELECT id FROM courses WHERE group_id = ?1 ORDER BY position_in_group, id",
                )?;
                let ids = stmt
                    .query_map([id.get()], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                ids
            };

            let base = next_position_in_group(tx, None)?;
            for (offset, course_id) in members.iter().enumerate() {
                tx.execute(
                    "UPDATE courses SET group_id = NULL, position_in_group = ?1 WHERE id = ?2",
                    params![base + offset as i64, course_id],
                )?;
            }

            tx.execute("DELETE FROM course_groups WHERE id = ?1", [id.get()])?;
            renumber_groups(tx)
        })?;

        tracing::info!(group_id = %id, "group deleted");
        Ok(())
    }

    /// Sets `position = index` for each group in `ordered_ids`, in one
    /// transaction. Order is taken only from the list.
    pub fn reorder(&self, ordered_ids: &[GroupId]) -> Result<()> {
        let now = now_timestamp();
        self.db.transaction(|tx| {
            let mut update = tx.prepare(
                "UPDATE course_groups SET position = ?1, updated_at = ?2 WHERE id = ?3",
            )?;
            for (index, id) in ordered_ids.iter().enumerate() {
                update.execute(params![index as i64, now, id.get()])?;
            }
            Ok(())
        })
    }

    pub fn set_collapsed(&self, id: GroupId, collapsed: bool) -> Result<()> {
        self.db.connection().execute(
            "UPDATE course_groups SET collapsed = ?1, updated_at = ?2 WHERE id = ?3",
            params![collapsed, now_timestamp(), id.get()],
        )?;
        Ok(())
    }

    /// Flips the collapsed flag and returns the new value, or `None` when
    /// the group does not exist.
    pub fn toggle_collapsed(&self, id: GroupId) -> Result<Option<bool>> {
        let now = now_timestamp();
        self.db.transaction(|tx| {
            tx.execute(
                "UPDATE course_groups SET collapsed = NOT collapsed, updated_at = ?1 WHERE id = ?2",
                params![now, id.get()],
            )?;
            let collapsed = tx
                .query_row(
                    "SELECT collapsed FROM course_groups WHERE id = ?1",
                    [id.get()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(collapsed)
        })
    }
}

/// Rewrites group positions as 0..n, keeping their current order.
fn renumber_groups(conn: &Connection) -> Result<()> {
    let ids: Vec<i64> = {
        let mut stmt = conn.prepare("SELECT id FROM course_groups ORDER BY position, id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        ids
    };

    let mut update = conn.prepare("UPDATE course_groups SET position = ?1 WHERE id = ?2")?;
    for (index, id) in ids.iter().enumerate() {
        update.execute(params![index as i64, id])?;
    }
    Ok(())
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<CourseGroup> {
    Ok(CourseGroup {
        id: GroupId::new(row.get(0)?),
        name: row.get(1)?,
        position: row.get(2)?,
        collapsed: row.get(3)?,
        created_at: timestamp_column(row, 4)?,
        updated_at: timestamp_column(row, 5)?,
    })
}
