// src/store/schema.rs

//! Table layout of the shared task store.
//!
//! Other tools own these tables and create the rows; storydag only reads
//! them and updates scheduling columns. [`ensure_schema`] exists for tests
//! and fresh checkouts.

use rusqlite::{Connection, OptionalExtension};

use crate::errors::Result;

pub const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS stories (
    slug        TEXT PRIMARY KEY,
    story_id    TEXT,
    title       TEXT,
    epic_key    TEXT,
    epic_title  TEXT,
    sequence    INTEGER
);

CREATE TABLE IF NOT EXISTS tasks (
    id            INTEGER PRIMARY KEY,
    story_slug    TEXT NOT NULL,
    position      INTEGER NOT NULL,
    task_id       TEXT,
    title         TEXT,
    status        TEXT,
    status_reason TEXT,
    started_at    TEXT,
    completed_at  TEXT,
    updated_at    TEXT,
    last_run      TEXT,
    UNIQUE (story_slug, position)
);

CREATE INDEX IF NOT EXISTS idx_tasks_task_id ON tasks(task_id);
";

/// Create the tables if they do not exist yet.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Whether `name` exists as a table.
pub fn has_table(conn: &Connection, name: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}
