// src/engine/summary.rs

use std::fmt;

use crate::dag::SchedulePlan;
use crate::store::StoryRecord;

/// Story-level verdict in the TSV output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoryState {
    /// No tasks.
    Empty,
    /// Every task done.
    Done,
    /// At least one task can be picked up.
    Ready,
    /// Tasks remain but all of them are blocked.
    Blocked,
    /// The story's pipeline failed.
    Error,
}

impl StoryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoryState::Empty => "empty",
            StoryState::Done => "done",
            StoryState::Ready => "ready",
            StoryState::Blocked => "blocked",
            StoryState::Error => "error",
        }
    }
}

impl fmt::Display for StoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One TSV row per story:
/// `sequence, slug, storyId, title, epicKey, epicTitle, totalTasks,
/// nextReadyIndex, completedCount, storyStatus`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorySummary {
    pub story: StoryRecord,
    pub total_tasks: usize,
    /// 1-based position of the first ready task in the new order, 0 if none.
    pub next_ready_index: usize,
    pub completed_count: usize,
    pub state: StoryState,
}

impl StorySummary {
    pub fn from_plan(story: StoryRecord, plan: &SchedulePlan) -> Self {
        let total_tasks = plan.order.len();
        let next_ready_index = plan.next_ready_index();
        let completed_count = plan.completed_count();
        let state = if total_tasks == 0 {
            StoryState::Empty
        } else if completed_count == total_tasks {
            StoryState::Done
        } else if next_ready_index > 0 {
            StoryState::Ready
        } else {
            StoryState::Blocked
        };
        Self {
            story,
            total_tasks,
            next_ready_index,
            completed_count,
            state,
        }
    }

    pub fn error(story: StoryRecord) -> Self {
        Self {
            story,
            total_tasks: 0,
            next_ready_index: 0,
            completed_count: 0,
            state: StoryState::Error,
        }
    }

    pub fn to_tsv(&self) -> String {
        let s = &self.story;
        let fields = [
            s.sequence.map(|n| n.to_string()).unwrap_or_default(),
            s.slug.clone(),
            s.story_id.clone().unwrap_or_else(|| s.slug.clone()),
            s.title.clone().unwrap_or_default(),
            s.epic_key.clone().unwrap_or_default(),
            s.epic_title.clone().unwrap_or_default(),
            self.total_tasks.to_string(),
            self.next_ready_index.to_string(),
            self.completed_count.to_string(),
            self.state.to_string(),
        ];
        fields.map(|f| tsv_field(&f)).join("\t")
    }
}

/// Tabs and newlines would break the row.
fn tsv_field(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}
