// src/report/explain.rs

//! `storydag why`: resolve one task reference and explain its status.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::dag::{DoneSet, TaskStatus, explain_reason};
use crate::errors::{Result, StorydagError};
use crate::store::{StoryRecord, TaskRecord, TaskStore};

static POSITION_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(.+):position(\d+)$").expect("static regex"));

/// A resolved task with its decoded status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskExplanation {
    pub task: TaskRecord,
    pub story: StoryRecord,
    pub status: TaskStatus,
    /// Plain-words lines decoded from a `dag:auto` reason.
    pub details: Vec<String>,
}

/// Resolve `reference` to a single task.
///
/// Tried in order: exact task id (case-insensitive), `slug:positionN`, then
/// a suffix of a task id. Ties go to the earliest story (by sequence) and
/// the lowest position.
pub fn resolve_task(store: &TaskStore, reference: &str) -> Result<Option<TaskRecord>> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Ok(None);
    }

    let stories = store.stories()?;
    let story_rank: BTreeMap<String, usize> = stories
        .iter()
        .enumerate()
        .map(|(idx, s)| (s.slug.to_lowercase(), idx))
        .collect();

    let mut tasks = store.all_tasks()?;
    tasks.sort_by_key(|t| {
        (
            story_rank.get(&t.story_slug.to_lowercase()).copied().unwrap_or(usize::MAX),
            t.story_slug.clone(),
            t.position,
        )
    });

    let lowered = reference.to_lowercase();
    let task_id_lower = |t: &TaskRecord| t.task_id.as_deref().map(|id| id.trim().to_lowercase());

    if let Some(task) = tasks
        .iter()
        .find(|t| task_id_lower(t).as_deref() == Some(lowered.as_str()))
    {
        return Ok(Some(task.clone()));
    }

    if let Some(caps) = POSITION_REF_RE.captures(reference) {
        let story_key = caps[1].to_lowercase();
        let slug = stories
            .iter()
            .find(|s| {
                s.slug.to_lowercase() == story_key
                    || s.story_id.as_deref().is_some_and(|id| id.to_lowercase() == story_key)
            })
            .map(|s| s.slug.to_lowercase())
            .unwrap_or(story_key);
        if let Ok(position) = caps[2].parse::<i64>() {
            if let Some(task) = tasks
                .iter()
                .find(|t| t.story_slug.to_lowercase() == slug && t.position == position)
            {
                return Ok(Some(task.clone()));
            }
        }
    }

    Ok(tasks
        .iter()
        .find(|t| task_id_lower(t).is_some_and(|id| id.ends_with(&lowered)))
        .cloned())
}

/// Explain a task reference, or fail with [`StorydagError::TaskNotFound`].
pub fn explain(store: &TaskStore, done: &DoneSet, reference: &str) -> Result<TaskExplanation> {
    let task = resolve_task(store, reference)?
        .ok_or_else(|| StorydagError::TaskNotFound(reference.to_string()))?;
    let story = store
        .story(&task.story_slug)?
        .unwrap_or_else(|| StoryRecord::bare(&task.story_slug));
    let status = TaskStatus::decode(&task.status, done);
    let details = task
        .status_reason
        .as_deref()
        .and_then(explain_reason)
        .unwrap_or_default();

    Ok(TaskExplanation {
        task,
        story,
        status,
        details,
    })
}

impl fmt::Display for TaskExplanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.task;
        writeln!(f, "task:     {}", t.label())?;
        writeln!(f, "story:    {}", self.story.slug)?;
        writeln!(f, "position: {}", t.position)?;
        writeln!(f, "title:    {}", t.title)?;
        let status = if t.status.is_empty() { "pending" } else { t.status.as_str() };
        writeln!(f, "status:   {status}")?;
        writeln!(f, "reason:   {}", t.status_reason.as_deref().unwrap_or("-"))?;
        for line in self.details.iter() {
            writeln!(f, "detail:   {line}")?;
        }
        Ok(())
    }
}
