// src/dag/plan.rs

//! Result type of one scheduling pass over a story.

use std::collections::BTreeMap;

use crate::dag::binding::BindingConflict;
use crate::dag::status::TaskStatus;
use crate::store::{TaskRecord, TaskUpdate};
use crate::types::NodeKey;

/// Everything a scheduling pass decided for one story, before anything is
/// written.
///
/// Useful for tests and `--dry-run`: the plan can be inspected, then handed
/// to the store.
#[derive(Debug, Clone, Default)]
pub struct SchedulePlan {
    /// Every task exactly once, in the computed order. Records are as read
    /// (old positions, old statuses).
    pub order: Vec<TaskRecord>,
    /// Status writes, only for rows whose stored values differ.
    pub updates: Vec<TaskUpdate>,
    /// Tasks left unbound because their node was already taken.
    pub conflicts: Vec<BindingConflict>,
    /// Bound nodes placed by position fallback because of a cycle.
    pub cyclic: Vec<NodeKey>,
    /// Status of every task once `updates` are applied, by store id.
    pub(crate) projected: BTreeMap<i64, TaskStatus>,
}

impl SchedulePlan {
    pub fn projected_status(&self, task_id: i64) -> Option<&TaskStatus> {
        self.projected.get(&task_id)
    }

    pub fn update_for(&self, task_id: i64) -> Option<&TaskUpdate> {
        self.updates.iter().find(|u| u.id == task_id)
    }

    /// Store ids in computed order.
    pub fn order_ids(&self) -> Vec<i64> {
        self.order.iter().map(|t| t.id).collect()
    }

    /// Task labels in computed order.
    pub fn order_labels(&self) -> Vec<String> {
        self.order.iter().map(TaskRecord::label).collect()
    }

    /// 1-based index (in the new order) of the first task that is neither
    /// done nor blocked; `0` when there is none.
    pub fn next_ready_index(&self) -> usize {
        self.order
            .iter()
            .position(|t| {
                self.projected_status(t.id)
                    .is_some_and(|s| !s.is_done() && !s.is_blocked())
            })
            .map_or(0, |idx| idx + 1)
    }

    pub fn completed_count(&self) -> usize {
        self.projected.values().filter(|s| s.is_done()).count()
    }

    /// Whether applying the plan would move any row.
    pub fn needs_resequence(&self) -> bool {
        self.order
            .iter()
            .enumerate()
            .any(|(idx, t)| t.position != idx as i64 + 1)
    }
}
