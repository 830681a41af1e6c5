// src/dag/state_manager.rs

//! Status transitions for a single task.
//!
//! The core only moves tasks between `pending` and its own
//! `blocked-dependency(..)` statuses. Done statuses only get their missing
//! timestamps stamped; everything else is left alone.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::dag::status::{Blockers, DoneSet, PENDING, TaskStatus, is_auto_reason};
use crate::store::{TaskRecord, TaskUpdate, TimestampChange};

/// Decides the write (if any) that brings one task in line with its
/// computed blockers.
#[derive(Debug, Clone, Copy)]
pub struct StateManager<'a> {
    done: &'a DoneSet,
    now: DateTime<Utc>,
}

impl<'a> StateManager<'a> {
    pub fn new(done: &'a DoneSet, now: DateTime<Utc>) -> Self {
        Self { done, now }
    }

    pub fn decode(&self, task: &TaskRecord) -> TaskStatus {
        TaskStatus::decode(&task.status, self.done)
    }

    /// Returns `None` when the stored row already matches.
    pub fn transition(&self, task: &TaskRecord, blockers: &Blockers) -> Option<TaskUpdate> {
        let current = self.decode(task);
        let auto = is_auto_reason(task.status_reason.as_deref());

        match current {
            TaskStatus::Done(_) => self.stamp_done(task),
            TaskStatus::Other(_) => None,
            TaskStatus::BlockedDependency(_) if !auto => {
                debug!(
                    task = %task.label(),
                    "blocked status not owned by scheduler; leaving as is"
                );
                None
            }
            TaskStatus::Pending | TaskStatus::BlockedDependency(_) if !blockers.is_empty() => {
                self.block(task, blockers)
            }
            TaskStatus::BlockedDependency(_) => Some(self.reset(task)),
            TaskStatus::Pending => None,
        }
    }

    fn block(&self, task: &TaskRecord, blockers: &Blockers) -> Option<TaskUpdate> {
        let status = blockers.encode_status();
        let reason = blockers.reason();
        if task.status == status && task.status_reason.as_deref() == Some(reason.as_str()) {
            return None;
        }
        Some(TaskUpdate {
            id: task.id,
            status,
            status_reason: Some(reason),
            started_at: match task.started_at {
                Some(_) => TimestampChange::Keep,
                None => TimestampChange::Set(self.now),
            },
            completed_at: TimestampChange::Keep,
        })
    }

    fn reset(&self, task: &TaskRecord) -> TaskUpdate {
        TaskUpdate {
            id: task.id,
            status: PENDING.to_string(),
            status_reason: None,
            started_at: TimestampChange::Clear,
            completed_at: TimestampChange::Clear,
        }
    }

    /// A done task missing `completed_at` gets it (and `started_at` when
    /// absent) stamped once.
    fn stamp_done(&self, task: &TaskRecord) -> Option<TaskUpdate> {
        if task.completed_at.is_some() {
            return None;
        }
        Some(TaskUpdate {
            id: task.id,
            status: task.status.clone(),
            status_reason: task.status_reason.clone(),
            started_at: match task.started_at {
                Some(_) => TimestampChange::Keep,
                None => TimestampChange::Set(self.now),
            },
            completed_at: TimestampChange::Set(self.now),
        })
    }
}
