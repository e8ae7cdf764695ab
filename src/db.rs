mod schema;

use std::path::Path;

use anyhow::Result;
use rusqlite::types::Type;
use rusqlite::{Connection, Row, Transaction};
use time::OffsetDateTime;

use schema::{INITIAL_SCHEMA, MIGRATIONS};

/// Database wrapper providing connection management and schema initialization.
///
/// The handle is constructed explicitly and owned by whoever drives the
/// repositories; there is no process-wide connection.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens an in-memory SQLite database.
    ///
    /// Automatically initializes the schema on connection open.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Opens a file-based SQLite database at the given path.
    ///
    /// Creates the database file if it does not exist.
    /// Automatically initializes or upgrades the schema on connection open.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize_schema()?;
        tracing::debug!(path = %path.display(), "database opened");
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// Uses IF NOT EXISTS for the base tables, then applies every additive
    /// step in order, ignoring "duplicate column" errors so that fresh and
    /// older databases converge on the same shape.
    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute("PRAGMA foreign_keys = ON", [])?;
        self.conn.execute_batch(INITIAL_SCHEMA)?;

        for statement in MIGRATIONS {
            match self.conn.execute(statement, []) {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(err, msg)) => {
                    let is_duplicate_column = msg
                        .as_ref()
                        .map(|s| s.contains("duplicate column"))
                        .unwrap_or(false);

                    if !is_duplicate_column {
                        return Err(rusqlite::Error::SqliteFailure(err, msg).into());
                    }
                    // Column already present: this step was applied earlier
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Runs `f` inside a single transaction.
    ///
    /// Commits when `f` returns `Ok`. Any error drops the transaction,
    /// which rolls back every statement executed inside it.
    pub fn transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Closes the connection, reporting any error SQLite raises while
    /// finalizing.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, err)| err)?;
        tracing::debug!("database closed");
        Ok(())
    }
}

/// Current time as Unix seconds, the storage format for every timestamp.
pub(crate) fn now_timestamp() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Reads an INTEGER Unix-seconds column as an `OffsetDateTime`.
pub(crate) fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<OffsetDateTime> {
    let secs: i64 = row.get(idx)?;
    OffsetDateTime::from_unix_timestamp(secs)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn column_names(db: &Database, table: &str) -> Vec<String> {
        db.connection()
            .prepare(&format!("PRAGMA table_info({table})"))
            .unwrap()
            .query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect()
    }

    #[test]
    fn in_memory_opens_successfully() {
        let result = Database::in_memory();
        assert!(result.is_ok());
    }

    #[test]
    fn schema_tables_exist() {
        let db = Database::in_memory().unwrap();

        let tables: Vec<String> = db
            .connection()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        for expected in ["courses", "videos", "tags", "course_tags", "course_groups"] {
            assert!(tables.contains(&expected.to_string()), "missing table {expected}");
        }
    }

    #[test]
    fn schema_indexes_exist() {
        let db = Database::in_memory().unwrap();

        let indexes: Vec<String> = db
            .connection()
            .prepare("SELECT name FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(indexes.contains(&"idx_videos_course_id".to_string()));
        assert!(indexes.contains(&"idx_course_tags_course_id".to_string()));
        assert!(indexes.contains(&"idx_courses_source_url".to_string()));
        assert!(indexes.contains(&"idx_videos_course_source".to_string()));
    }

    #[test]
    fn foreign_keys_enabled() {
        let db = Database::in_memory().unwrap();

        let fk_enabled: i32 = db
            .connection()
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();

        assert_eq!(fk_enabled, 1);
    }

    #[test]
    fn open_creates_database_file() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        let result = Database::open(&db_path);
        assert!(result.is_ok());
        assert!(db_path.exists());
    }

    #[test]
    fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        {
            let db = Database::open(&db_path).unwrap();
            db.connection()
                .execute(
                    "INSERT INTO courses (title, source_url, created_at, updated_at)
                     VALUES ('Rust', 'https://example.com/p', 0, 0)",
                    [],
                )
                .unwrap();
            db.close().unwrap();
        }

        let db2 = Database::open(&db_path).expect("second open should succeed");

        let count: i32 = db2
            .connection()
            .query_row("SELECT COUNT(*) FROM courses", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn open_upgrades_database_created_before_groups_existed() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("legacy.db");

        {
            let conn = Connection::open(&db_path).unwrap();
            conn.execute_batch(
                "CREATE TABLE courses (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    channel TEXT,
                    source_playlist_id TEXT,
                    source_url TEXT NOT NULL,
                    thumbnail_url TEXT,
                    local_folder_path TEXT NOT NULL DEFAULT '',
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                CREATE TABLE videos (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    course_id INTEGER NOT NULL,
                    source_video_id TEXT NOT NULL,
                    title TEXT NOT NULL,
                    duration_seconds INTEGER,
                    position INTEGER NOT NULL DEFAULT 0,
                    thumbnail_url TEXT,
                    status TEXT NOT NULL DEFAULT 'not_started',
                    notes TEXT NOT NULL DEFAULT '',
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                INSERT INTO courses (title, source_url, created_at, updated_at)
                    VALUES ('Old course', 'https://example.com/old', 10, 10);
                INSERT INTO videos (course_id, source_video_id, title, created_at, updated_at)
                    VALUES (1, 'abc', 'Intro', 10, 10);",
            )
            .unwrap();
        }

        let db = Database::open(&db_path).expect("upgrade should succeed");

        assert!(column_names(&db, "videos").contains(&"progress_seconds".to_string()));
        let course_columns = column_names(&db, "courses");
        assert!(course_columns.contains(&"group_id".to_string()));
        assert!(course_columns.contains(&"position_in_group".to_string()));

        let (title, progress): (String, i64) = db
            .connection()
            .query_row(
                "SELECT v.title, v.progress_seconds FROM videos v WHERE v.id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(title, "Intro");
        assert_eq!(progress, 0);
    }

    #[test]
    fn initialize_schema_twice_ignores_existing_columns() {
        let db = Database::in_memory().unwrap();

        db.initialize_schema()
            .expect("re-running additive steps should be a no-op");

        let progress_columns = column_names(&db, "videos")
            .into_iter()
            .filter(|name| name == "progress_seconds")
            .count();
        assert_eq!(progress_columns, 1);
    }

    #[test]
    fn tag_names_are_unique_case_insensitively() {
        let db = Database::in_memory().unwrap();
        let conn = db.connection();

        conn.execute("INSERT INTO tags (name) VALUES ('Rust')", [])
            .unwrap();
        let duplicate = conn.execute("INSERT INTO tags (name) VALUES ('rust')", []);

        assert!(duplicate.is_err());
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let db = Database::in_memory().unwrap();

        let result: Result<()> = db.transaction(|tx| {
            tx.execute("INSERT INTO tags (name) VALUES ('kept?')", [])?;
            anyhow::bail!("abort");
        });
        assert!(result.is_err());

        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn transaction_commits_on_success() {
        let db = Database::in_memory().unwrap();

        let id = db
            .transaction(|tx| {
                tx.execute("INSERT INTO tags (name) VALUES ('kept')", [])?;
                Ok(tx.last_insert_rowid())
            })
            .unwrap();

        let name: String = db
            .connection()
            .query_row("SELECT name FROM tags WHERE id = ?1", [id], |row| row.get(0))
            .unwrap();
        assert_eq!(name, "kept");
    }

    #[test]
    fn timestamp_column_reads_unix_seconds() {
        let db = Database::in_memory().unwrap();

        let value = db
            .connection()
            .query_row("SELECT 86400", [], |row| timestamp_column(row, 0))
            .unwrap();

        assert_eq!(value, OffsetDateTime::UNIX_EPOCH + time::Duration::days(1));
    }
}
