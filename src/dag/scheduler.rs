// src/dag/scheduler.rs

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::dag::binding::{Binding, bind_tasks};
use crate::dag::graph::{DagGraph, OrderKey};
use crate::dag::plan::SchedulePlan;
use crate::dag::state_manager::StateManager;
use crate::dag::status::{Blockers, DoneSet, TaskStatus};
use crate::gates::{GateResults, GateScopes};
use crate::graph::GraphSpec;
use crate::store::TaskRecord;
use crate::types::NodeKey;

/// Computes order and blocked/ready status for one story.
///
/// The scheduler is pure: it reads task records, the story graph and a
/// snapshot of gate outcomes, and returns a [`SchedulePlan`]. Writing the
/// plan back is the caller's job.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler<'a> {
    spec: Option<&'a GraphSpec>,
    done: &'a DoneSet,
    scopes: &'a GateScopes,
}

/// Graph-derived state shared by every per-task decision of one pass.
struct GraphView<'a> {
    spec: &'a GraphSpec,
    graph: DagGraph,
    binding: Binding,
    ancestors: BTreeMap<NodeKey, BTreeSet<NodeKey>>,
}

impl<'a> Scheduler<'a> {
    /// `spec == None` means the story has no (usable) graph: tasks keep their
    /// position order and no graph blockers apply.
    pub fn new(spec: Option<&'a GraphSpec>, done: &'a DoneSet, scopes: &'a GateScopes) -> Self {
        Self { spec, done, scopes }
    }

    pub fn plan(
        &self,
        tasks: &[TaskRecord],
        gates: &GateResults,
        now: DateTime<Utc>,
    ) -> SchedulePlan {
        let mut by_position: Vec<&TaskRecord> = tasks.iter().collect();
        by_position.sort_by_key(|t| (t.position, t.id));

        let states = StateManager::new(self.done, now);
        let view = self.spec.map(|spec| GraphView {
            spec,
            graph: DagGraph::from_spec(spec),
            binding: bind_tasks(tasks, spec),
            ancestors: BTreeMap::new(),
        });

        let mut plan = SchedulePlan::default();
        let order: Vec<&TaskRecord> = match view {
            None => by_position.clone(),
            Some(ref view) => {
                let (order, cyclic) = self.order_with_graph(view, &by_position);
                plan.cyclic = cyclic;
                order
            }
        };
        let view = view.map(|mut v| {
            v.ancestors = v.graph.ancestors();
            v
        });

        let done_ids: BTreeSet<i64> = tasks
            .iter()
            .filter(|t| states.decode(t).is_done())
            .map(|t| t.id)
            .collect();

        for task in order.iter() {
            let blockers = match view.as_ref() {
                Some(view) => self.blockers_for(task, view, &done_ids, gates),
                None => Blockers::default(),
            };
            let update = states.transition(task, &blockers);
            let projected = match update.as_ref() {
                Some(u) => TaskStatus::decode(&u.status, self.done),
                None => states.decode(task),
            };
            if let Some(update) = update {
                debug!(task = %task.label(), status = %update.status, "status change planned");
                plan.updates.push(update);
            }
            plan.projected.insert(task.id, projected);
        }

        if let Some(view) = view {
            plan.conflicts = view.binding.conflicts;
        }
        plan.order = order.into_iter().cloned().collect();
        plan
    }

    /// Bound tasks in priority topological order, then unbound tasks by
    /// position.
    fn order_with_graph<'t>(
        &self,
        view: &GraphView<'_>,
        by_position: &[&'t TaskRecord],
    ) -> (Vec<&'t TaskRecord>, Vec<NodeKey>) {
        let by_id: BTreeMap<i64, &'t TaskRecord> = by_position.iter().map(|t| (t.id, *t)).collect();

        let keep: BTreeMap<NodeKey, OrderKey> = view
            .binding
            .bound_nodes()
            .filter_map(|node| {
                let task = by_id.get(&view.binding.task_of(node)?)?;
                let rank = view.spec.node(node)?.kind.rank();
                Some((
                    node.to_string(),
                    OrderKey {
                        rank,
                        position: task.position,
                    },
                ))
            })
            .collect();

        let node_order = view.graph.priority_order(&keep);
        if !node_order.cyclic.is_empty() {
            warn!(
                story = %view.spec.story_id,
                nodes = ?node_order.cyclic,
                "cycle among bound nodes; placing them by position"
            );
        }

        let mut order: Vec<&'t TaskRecord> = node_order
            .order
            .iter()
            .filter_map(|node| view.binding.task_of(node))
            .filter_map(|id| by_id.get(&id).copied())
            .collect();
        let placed: BTreeSet<i64> = order.iter().map(|t| t.id).collect();
        order.extend(by_position.iter().filter(|t| !placed.contains(&t.id)).copied());

        info!(
            story = %view.spec.story_id,
            bound = keep.len(),
            unbound = by_position.len() - keep.len().min(by_position.len()),
            "computed task order"
        );
        (order, node_order.cyclic)
    }

    fn blockers_for(
        &self,
        task: &TaskRecord,
        view: &GraphView<'_>,
        done_ids: &BTreeSet<i64>,
        gates: &GateResults,
    ) -> Blockers {
        let Some(node) = view.binding.node_of(task.id) else {
            return Blockers::default();
        };
        let node_done = |key: &str| {
            view.binding
                .task_of(key)
                .is_some_and(|id| done_ids.contains(&id))
        };

        let parents = view
            .graph
            .parents_of(node)
            .iter()
            .filter(|p| !node_done(p))
            .cloned()
            .collect();

        let spec = view
            .ancestors
            .get(node)
            .into_iter()
            .flatten()
            .filter(|a| view.spec.node(a).is_some_and(|m| m.kind.is_spec_like()))
            .filter(|a| !node_done(a))
            .cloned()
            .collect();

        let requires = match view.spec.node(node) {
            Some(meta) => gates
                .values()
                .filter(|g| !g.ok && self.scopes.applies(&g.gate, &meta.kind))
                .map(|g| (g.gate.clone(), g.detail.clone()))
                .collect(),
            None => BTreeMap::new(),
        };

        Blockers {
            parents,
            spec,
            requires,
        }
    }
}
