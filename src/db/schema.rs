/// Base schema for the course tracker.
///
/// Uses CREATE TABLE/INDEX IF NOT EXISTS for idempotent execution.
/// Tables added after the first release live in `MIGRATIONS` instead.
pub const INITIAL_SCHEMA: &str = r#"
-- Courses: one imported playlist or single video
CREATE TABLE IF NOT EXISTS courses (
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

-- Videos: ordered units of a course with their own progress
CREATE TABLE IF NOT EXISTS videos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    course_id INTEGER NOT NULL,
    source_video_id TEXT NOT NULL,
    title TEXT NOT NULL,
    duration_seconds INTEGER,
    position INTEGER NOT NULL DEFAULT 0,
    thumbnail_url TEXT,
    status TEXT NOT NULL DEFAULT 'not_started'
        CHECK (status IN ('not_started', 'in_progress', 'completed')),
    notes TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
);

-- Tags: unique names (case-insensitive)
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE
);

-- Junction table: links courses to tags (many-to-many)
CREATE TABLE IF NOT EXISTS course_tags (
    course_id INTEGER NOT NULL,
    tag_id INTEGER NOT NULL,
    PRIMARY KEY (course_id, tag_id),
    FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE,
    FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_videos_course_id ON videos(course_id);
CREATE INDEX IF NOT EXISTS idx_videos_status ON videos(status);
CREATE INDEX IF NOT EXISTS idx_course_tags_course_id ON course_tags(course_id);
CREATE INDEX IF NOT EXISTS idx_course_tags_tag_id ON course_tags(tag_id);
"#;

/// Additive schema steps, executed one statement at a time in order.
///
/// Each step must be safe to repeat. `ALTER TABLE ... ADD COLUMN` has no
/// IF NOT EXISTS form, so the caller ignores "duplicate column" errors.
/// A table must be created before any column that references it.
pub const MIGRATIONS: &[&str] = &[
    "ALTER TABLE videos ADD COLUMN progress_seconds INTEGER NOT NULL DEFAULT 0",
    "CREATE TABLE IF NOT EXISTS course_groups (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        position INTEGER NOT NULL DEFAULT 0,
        collapsed INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "ALTER TABLE courses ADD COLUMN group_id INTEGER REFERENCES course_groups(id) ON DELETE SET NULL",
    "ALTER TABLE courses ADD COLUMN position_in_group INTEGER NOT NULL DEFAULT 0",
    "CREATE INDEX IF NOT EXISTS idx_courses_source_url ON courses(source_url)",
    "CREATE INDEX IF NOT EXISTS idx_courses_group_id ON courses(group_id)",
    "CREATE INDEX IF NOT EXISTS idx_videos_course_source ON videos(course_id, source_video_id)",
];
