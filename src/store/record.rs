// src/store/record.rs

//! Row types read from the shared task store.

use chrono::{DateTime, Utc};

/// One task row. Rows are owned by the store; the scheduler only updates
/// status, reason, timestamps and position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    /// Store-internal identity (`tasks.id`).
    pub id: i64,
    pub story_slug: String,
    pub position: i64,
    /// External identifier such as `S01-T03`.
    pub task_id: Option<String>,
    pub title: String,
    /// Raw status literal; decode with `dag::status::TaskStatus::decode`.
    pub status: String,
    pub status_reason: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    /// Human label: the task id when present, else `slug:positionN`.
    pub fn label(&self) -> String {
        match self.task_id.as_deref() {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => position_ref(&self.story_slug, self.position),
        }
    }
}

/// The `story:positionN` composite reference of a task.
pub fn position_ref(slug: &str, position: i64) -> String {
    format!("{slug}:position{position}")
}

/// One story row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoryRecord {
    pub slug: String,
    /// Legacy story identifier (older task rows may carry it as their slug).
    pub story_id: Option<String>,
    pub title: Option<String>,
    pub epic_key: Option<String>,
    pub epic_title: Option<String>,
    pub sequence: Option<i64>,
}

impl StoryRecord {
    /// Placeholder for a story known only through its task rows.
    pub fn bare(slug: &str) -> Self {
        Self {
            slug: slug.to_string(),
            ..Self::default()
        }
    }
}

/// Change to a timestamp column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampChange {
    Keep,
    Set(DateTime<Utc>),
    Clear,
}

/// A status write computed by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskUpdate {
    pub id: i64,
    pub status: String,
    pub status_reason: Option<String>,
    pub started_at: TimestampChange,
    pub completed_at: TimestampChange,
}
