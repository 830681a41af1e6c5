// src/report/ready.rs

use std::fmt;

use crate::dag::{DoneSet, TaskStatus};
use crate::errors::Result;
use crate::store::{StoryRecord, TaskStore};

/// Ready and blocked tasks of one story, in position order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryReadiness {
    pub story: StoryRecord,
    /// `(label, title)` of tasks that are neither done nor blocked.
    pub ready: Vec<(String, String)>,
    /// `(label, reason)` of blocked tasks.
    pub blocked: Vec<(String, String)>,
    pub done: usize,
    pub total: usize,
}

/// Ready/blocked lists per story, optionally for one story only.
pub fn list_ready(
    store: &TaskStore,
    done: &DoneSet,
    story_filter: Option<&str>,
) -> Result<Vec<StoryReadiness>> {
    let stories = match story_filter {
        Some(key) => vec![store.story(key)?.unwrap_or_else(|| StoryRecord::bare(key))],
        None => store.stories()?,
    };

    let mut out = Vec::with_capacity(stories.len());
    for story in stories {
        let tasks = store.peek_tasks_for_story(&story.slug)?;
        let mut readiness = StoryReadiness {
            story,
            ready: Vec::new(),
            blocked: Vec::new(),
            done: 0,
            total: tasks.len(),
        };
        for task in tasks.iter() {
            match TaskStatus::decode(&task.status, done) {
                TaskStatus::Done(_) => readiness.done += 1,
                TaskStatus::BlockedDependency(blockers) => {
                    let reason = task
                        .status_reason
                        .clone()
                        .filter(|r| !r.trim().is_empty())
                        .unwrap_or_else(|| blockers.encode_status());
                    readiness.blocked.push((task.label(), reason));
                }
                TaskStatus::Pending | TaskStatus::Other(_) => {
                    readiness.ready.push((task.label(), task.title.clone()));
                }
            }
        }
        out.push(readiness);
    }
    Ok(out)
}

impl fmt::Display for StoryReadiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.story.title.as_deref() {
            Some(title) if !title.is_empty() => writeln!(f, "== {} ({title}) ==", self.story.slug)?,
            _ => writeln!(f, "== {} ==", self.story.slug)?,
        }
        if self.total == 0 {
            return writeln!(f, "no tasks");
        }
        writeln!(f, "done: {}/{}", self.done, self.total)?;
        writeln!(f, "ready:")?;
        if self.ready.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for (label, title) in self.ready.iter() {
            writeln!(f, "  - {label}  {title}")?;
        }
        writeln!(f, "blocked:")?;
        if self.blocked.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for (label, reason) in self.blocked.iter() {
            writeln!(f, "  - {label}  {reason}")?;
        }
        Ok(())
    }
}
