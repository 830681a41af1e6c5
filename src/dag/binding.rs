// src/dag/binding.rs

//! Node ↔ task binding.
//!
//! A task binds to a node when its task id is listed in the node's
//! `task_id_map` aliases, or when the task id ends with the node key at a
//! word boundary (`S01-API03` binds `API03`, `XAPI03` does not). Alias matches
//! beat suffix matches. Tasks are considered in position order and a node
//! keeps the first task that claims it; later claimants stay unbound and are
//! reported as [`BindingConflict`]s.

use std::collections::BTreeMap;

use regex::Regex;
use tracing::{debug, warn};

use crate::graph::GraphSpec;
use crate::store::TaskRecord;
use crate::types::NodeKey;

/// A task that matched a node already bound to an earlier task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingConflict {
    pub node: NodeKey,
    /// Label of the task that keeps the node.
    pub bound_to: String,
    /// Label of the task left unbound.
    pub rejected: String,
}

/// Result of binding one story's tasks against its graph.
#[derive(Debug, Clone, Default)]
pub struct Binding {
    node_of: BTreeMap<i64, NodeKey>,
    task_of: BTreeMap<NodeKey, i64>,
    pub conflicts: Vec<BindingConflict>,
}

impl Binding {
    /// Node bound to the task with store id `task_id`.
    pub fn node_of(&self, task_id: i64) -> Option<&str> {
        self.node_of.get(&task_id).map(String::as_str)
    }

    /// Store id of the task bound to `node`.
    pub fn task_of(&self, node: &str) -> Option<i64> {
        self.task_of.get(node).copied()
    }

    pub fn is_bound(&self, node: &str) -> bool {
        self.task_of.contains_key(node)
    }

    pub fn bound_nodes(&self) -> impl Iterator<Item = &str> {
        self.task_of.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.task_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.task_of.is_empty()
    }
}

enum Match {
    Alias(NodeKey),
    Suffix(NodeKey),
}

impl Match {
    fn node(&self) -> &NodeKey {
        match self {
            Match::Alias(n) | Match::Suffix(n) => n,
        }
    }
}

/// Bind `tasks` to the nodes of `spec`.
pub fn bind_tasks(tasks: &[TaskRecord], spec: &GraphSpec) -> Binding {
    let suffix_patterns: Vec<(&NodeKey, Regex)> = spec
        .nodes
        .keys()
        .filter_map(|key| {
            let pattern = format!(r"(?i)(?:^|[^A-Za-z0-9]){}$", regex::escape(key));
            match Regex::new(&pattern) {
                Ok(re) => Some((key, re)),
                Err(err) => {
                    warn!(node = %key, error = %err, "cannot build binding pattern");
                    None
                }
            }
        })
        .collect();

    let mut ordered: Vec<&TaskRecord> = tasks.iter().collect();
    ordered.sort_by_key(|t| (t.position, t.id));

    let mut binding = Binding::default();
    for task in ordered {
        let Some(task_id) = task.task_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            continue;
        };
        let Some(candidate) = best_match(task_id, spec, &suffix_patterns) else {
            continue;
        };

        let node = candidate.node().clone();
        if let Some(owner) = binding.task_of.get(&node) {
            let bound_to = tasks
                .iter()
                .find(|t| t.id == *owner)
                .map(TaskRecord::label)
                .unwrap_or_default();
            warn!(
                node = %node,
                task = %task.label(),
                bound_to = %bound_to,
                "node already bound to an earlier task; leaving task unbound"
            );
            binding.conflicts.push(BindingConflict {
                node,
                bound_to,
                rejected: task.label(),
            });
            continue;
        }

        debug!(
            node = %node,
            task = %task.label(),
            via = if matches!(candidate, Match::Alias(_)) { "alias" } else { "suffix" },
            "bound task to node"
        );
        binding.node_of.insert(task.id, node.clone());
        binding.task_of.insert(node, task.id);
    }

    binding
}

/// Alias matches first (in node key order), then the longest suffix match.
fn best_match(
    task_id: &str,
    spec: &GraphSpec,
    suffix_patterns: &[(&NodeKey, Regex)],
) -> Option<Match> {
    let lowered = task_id.to_lowercase();
    if let Some((node, _)) = spec
        .alias_map
        .iter()
        .find(|(node, ids)| spec.nodes.contains_key(*node) && ids.contains(&lowered))
    {
        return Some(Match::Alias(node.clone()));
    }

    suffix_patterns
        .iter()
        .filter(|(_, re)| re.is_match(task_id))
        .max_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| b.cmp(a)))
        .map(|(node, _)| Match::Suffix((*node).clone()))
}
