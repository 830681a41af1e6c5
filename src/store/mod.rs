// src/store/mod.rs

//! SQLite adapter over the shared task store.
//!
//! The store is shared with other tools that may write concurrently. No
//! lock is taken across a read-compute-write cycle: storydag assumes a
//! single scheduler process and relies on recomputation being idempotent.
//! Missing tables read as zero rows.

pub mod record;
pub mod schema;

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params};
use tracing::{debug, info, warn};

use crate::errors::Result;

pub use record::{StoryRecord, TaskRecord, TaskUpdate, TimestampChange, position_ref};
pub use schema::{SCHEMA_SQL, ensure_schema, has_table};

const TASK_COLUMNS: &str = "id, story_slug, position, task_id, title, status, status_reason, \
                            started_at, completed_at";

#[derive(Debug)]
pub struct TaskStore {
    conn: Connection,
}

impl TaskStore {
    /// Open an existing store file. Tables are not created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self { conn })
    }

    /// In-memory store with the schema installed.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        ensure_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn ensure_schema(&self) -> Result<()> {
        ensure_schema(&self.conn)
    }

    /// All stories, in sequence order.
    ///
    /// Falls back to the distinct slugs of the task rows when there is no
    /// (or an empty) `stories` table.
    pub fn stories(&self) -> Result<Vec<StoryRecord>> {
        if has_table(&self.conn, "stories")? {
            let mut stmt = self.conn.prepare(
                "SELECT slug, story_id, title, epic_key, epic_title, sequence FROM stories \
                 ORDER BY sequence IS NULL, sequence, slug",
            )?;
            let stories = stmt
                .query_map([], story_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            if !stories.is_empty() {
                return Ok(stories);
            }
        }
        if !has_table(&self.conn, "tasks")? {
            return Ok(Vec::new());
        }
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT story_slug FROM tasks ORDER BY story_slug")?;
        let slugs = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(slugs.iter().map(|s| StoryRecord::bare(s)).collect())
    }

    /// Look a story up by slug (case-insensitive) or legacy story id.
    pub fn story(&self, key: &str) -> Result<Option<StoryRecord>> {
        if !has_table(&self.conn, "stories")? {
            return Ok(None);
        }
        let story = self
            .conn
            .query_row(
                "SELECT slug, story_id, title, epic_key, epic_title, sequence FROM stories \
                 WHERE slug = ?1 COLLATE NOCASE OR story_id = ?1 COLLATE NOCASE \
                 ORDER BY slug = ?1 DESC LIMIT 1",
                [key],
                story_from_row,
            )
            .optional()?;
        Ok(story)
    }

    /// Resolve the tasks of a story, in position order.
    ///
    /// `key` may be the story slug or its legacy story id. Rows filed under a
    /// differently-cased slug or under the legacy id are moved to the
    /// canonical slug before being returned.
    pub fn tasks_for_story(&self, key: &str) -> Result<Vec<TaskRecord>> {
        self.resolve_tasks(key, true)
    }

    /// Like [`TaskStore::tasks_for_story`] but never writes: stray rows are
    /// returned under the canonical slug without being re-filed.
    pub fn peek_tasks_for_story(&self, key: &str) -> Result<Vec<TaskRecord>> {
        self.resolve_tasks(key, false)
    }

    fn resolve_tasks(&self, key: &str, heal: bool) -> Result<Vec<TaskRecord>> {
        if !has_table(&self.conn, "tasks")? {
            return Ok(Vec::new());
        }

        let story = self.story(key)?;
        let canonical = story.as_ref().map(|s| s.slug.as_str()).unwrap_or(key);
        let legacy = story
            .as_ref()
            .and_then(|s| s.story_id.as_deref())
            .unwrap_or(canonical);
        let rows = self.query_tasks(
            "WHERE story_slug = ?1 COLLATE NOCASE OR story_slug = ?2 COLLATE NOCASE \
             OR story_slug = ?3 COLLATE NOCASE",
            &[&canonical, &legacy, &key],
        )?;
        let (mut filed, strays): (Vec<TaskRecord>, Vec<TaskRecord>) =
            rows.into_iter().partition(|t| t.story_slug == canonical);
        if strays.is_empty() {
            return Ok(filed);
        }
        if !filed.is_empty() {
            warn!(
                story = %canonical,
                filed = filed.len(),
                stray = strays.len(),
                "task rows split between canonical and legacy slugs; merging"
            );
        }

        let moved = place_strays(&filed, strays, canonical);
        if heal {
            let tx = self.conn.unchecked_transaction()?;
            for (task, from) in moved.iter() {
                tx.execute(
                    "UPDATE tasks SET story_slug = ?1, position = ?2 WHERE id = ?3",
                    params![canonical, task.position, task.id],
                )?;
                debug!(story = %canonical, id = task.id, from = %from, "re-filed task row");
            }
            tx.commit()?;
            info!(
                story = %canonical,
                healed = moved.len(),
                "re-filed task rows under canonical story slug"
            );
        }

        filed.extend(moved.into_iter().map(|(task, _)| task));
        filed.sort_by_key(|t| (t.position, t.id));
        Ok(filed)
    }

    /// Every task row, ordered by slug and position.
    pub fn all_tasks(&self) -> Result<Vec<TaskRecord>> {
        if !has_table(&self.conn, "tasks")? {
            return Ok(Vec::new());
        }
        self.query_tasks("", &[])
    }

    /// Write one scheduler-computed status change.
    pub fn apply_update(&self, update: &TaskUpdate, now: DateTime<Utc>) -> Result<()> {
        let now_text = format_timestamp(now);
        let mut sets = vec!["status = ?", "status_reason = ?", "updated_at = ?", "last_run = ?"];
        let mut values: Vec<Box<dyn ToSql>> = vec![
            Box::new(update.status.clone()),
            Box::new(update.status_reason.clone()),
            Box::new(now_text.clone()),
            Box::new(now_text),
        ];
        for (column, change) in [
            ("started_at = ?", update.started_at),
            ("completed_at = ?", update.completed_at),
        ] {
            match change {
                TimestampChange::Keep => {}
                TimestampChange::Set(ts) => {
                    sets.push(column);
                    values.push(Box::new(format_timestamp(ts)));
                }
                TimestampChange::Clear => {
                    sets.push(column);
                    values.push(Box::new(Option::<String>::None));
                }
            }
        }
        values.push(Box::new(update.id));

        let sql = format!("UPDATE tasks SET {} WHERE id = ?", sets.join(", "));
        let refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let changed = self.conn.execute(&sql, refs.as_slice())?;
        if changed == 0 {
            warn!(id = update.id, "task row vanished before status write");
        }
        debug!(id = update.id, status = %update.status, "wrote task status");
        Ok(())
    }

    /// Rewrite positions so `ordered[i]` lands on position `i + 1`.
    ///
    /// Both passes (park every row above the story's current maximum, then
    /// assign final positions) run in one transaction so the
    /// `(story_slug, position)` uniqueness constraint never sees a collision
    /// and readers never see a half-applied order. Returns the number of rows
    /// moved; zero when the order is already in place.
    pub fn resequence(
        &mut self,
        slug: &str,
        ordered: &[TaskRecord],
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let in_place = ordered
            .iter()
            .enumerate()
            .all(|(idx, task)| task.position == idx as i64 + 1);
        if in_place {
            debug!(story = %slug, "task order already in place");
            return Ok(0);
        }

        let now_text = format_timestamp(now);
        let tx = self.conn.transaction()?;
        let max: i64 = tx.query_row(
            "SELECT COALESCE(MAX(position), 0) FROM tasks WHERE story_slug = ?1",
            [slug],
            |row| row.get(0),
        )?;
        let offset = max.max(ordered.len() as i64) + 1;

        for (idx, task) in ordered.iter().enumerate() {
            tx.execute(
                "UPDATE tasks SET position = ?1 WHERE id = ?2",
                params![offset + idx as i64, task.id],
            )?;
        }
        for (idx, task) in ordered.iter().enumerate() {
            tx.execute(
                "UPDATE tasks SET position = ?1, updated_at = ?2 WHERE id = ?3",
                params![idx as i64 + 1, now_text, task.id],
            )?;
        }
        tx.commit()?;

        info!(story = %slug, tasks = ordered.len(), "resequenced task positions");
        Ok(ordered.len())
    }

    fn query_tasks(&self, filter: &str, args: &[&dyn ToSql]) -> Result<Vec<TaskRecord>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks {filter} ORDER BY story_slug, position, id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let tasks = stmt
            .query_map(args, task_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }
}

/// Re-label stray rows with `slug`, keeping each position unless a row
/// already filed (or placed earlier) holds it; such rows take the next
/// position past the current maximum. Returns each row with its old slug.
fn place_strays(
    filed: &[TaskRecord],
    strays: Vec<TaskRecord>,
    slug: &str,
) -> Vec<(TaskRecord, String)> {
    let mut taken: BTreeSet<i64> = filed.iter().map(|t| t.position).collect();
    strays
        .into_iter()
        .map(|mut t| {
            if taken.contains(&t.position) {
                t.position = taken.last().copied().unwrap_or(0) + 1;
            }
            taken.insert(t.position);
            let from = std::mem::replace(&mut t.story_slug, slug.to_string());
            (t, from)
        })
        .collect()
}

fn story_from_row(row: &Row<'_>) -> rusqlite::Result<StoryRecord> {
    Ok(StoryRecord {
        slug: row.get(0)?,
        story_id: row.get(1)?,
        title: row.get(2)?,
        epic_key: row.get(3)?,
        epic_title: row.get(4)?,
        sequence: row.get(5)?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<TaskRecord> {
    let started: Option<String> = row.get(7)?;
    let completed: Option<String> = row.get(8)?;
    Ok(TaskRecord {
        id: row.get(0)?,
        story_slug: row.get(1)?,
        position: row.get(2)?,
        task_id: row.get(3)?,
        title: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        status: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        status_reason: row.get(6)?,
        started_at: started.as_deref().and_then(parse_timestamp),
        completed_at: completed.as_deref().and_then(parse_timestamp),
    })
}

/// RFC 3339 with second precision, the format storydag writes.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a stored timestamp. Accepts RFC 3339 and SQLite's
/// `YYYY-MM-DD HH:MM:SS`. Any other non-empty text reads as the Unix epoch so
/// that "a timestamp is present" survives a format storydag does not know.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    warn!(value = %raw, "unrecognised timestamp format");
    DateTime::from_timestamp(0, 0)
}
