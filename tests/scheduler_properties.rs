// tests/scheduler_properties.rs

mod common;
use crate::common::builders::{GraphBuilder, task};
use crate::common::plan;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use storydag::dag::{Blockers, DoneSet, TaskStatus};
use storydag::gates::{GateOutcome, GateResults};
use storydag::graph::GraphSpec;
use storydag::store::{TaskRecord, TaskUpdate, TimestampChange};

const KINDS: [&str; 8] = ["ADR", "SPEC", "SCHEMA", "INSTRUMENT", "API", "UI", "TEST", "RUNBOOK"];

#[derive(Debug, Clone)]
struct Case {
    spec: GraphSpec,
    kinds: Vec<&'static str>,
    edges: Vec<(String, String)>,
    done: Vec<bool>,
    tasks: Vec<TaskRecord>,
}

fn key(i: usize) -> String {
    format!("N{i:02}")
}

fn build_case(
    kinds: Vec<usize>,
    edges: Vec<(usize, usize)>,
    positions: Vec<i64>,
    done: Vec<bool>,
) -> Case {
    let mut builder = GraphBuilder::new("story");
    for (i, kind) in kinds.iter().enumerate() {
        builder = builder.node(&key(i), KINDS[*kind], &format!("node {i}"));
    }
    let edges: Vec<(String, String)> = edges
        .into_iter()
        .map(|(p, c)| (key(p), key(c)))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    for (p, c) in edges.iter() {
        builder = builder.edge(p, c);
    }
    let tasks = positions
        .iter()
        .zip(done.iter())
        .enumerate()
        .map(|(i, (pos, is_done))| {
            let status = if *is_done { "done" } else { "pending" };
            task(i as i64 + 1, *pos, &format!("T-{}", key(i)), status)
        })
        .collect();
    Case {
        spec: builder.build(),
        kinds: kinds.iter().map(|k| KINDS[*k]).collect(),
        edges,
        done,
        tasks,
    }
}

/// Acyclic graphs: node `i` may only depend on nodes `0..i`.
fn dag_case(max_nodes: usize) -> impl Strategy<Value = Case> {
    (1..=max_nodes)
        .prop_flat_map(|n| {
            (
                proptest::collection::vec(0..KINDS.len(), n),
                proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..3), n),
                Just((1..=n as i64).collect::<Vec<_>>()).prop_shuffle(),
                proptest::collection::vec(any::<bool>(), n),
            )
        })
        .prop_map(|(kinds, deps, positions, done)| {
            let edges = deps
                .iter()
                .enumerate()
                .filter(|(i, _)| *i > 0)
                .flat_map(|(i, ds)| ds.iter().map(move |d| (d % i, i)))
                .collect();
            build_case(kinds, edges, positions, done)
        })
}

/// Arbitrary edges, cycles included.
fn any_graph_case(max_nodes: usize) -> impl Strategy<Value = Case> {
    (2..=max_nodes)
        .prop_flat_map(|n| {
            (
                proptest::collection::vec(0..KINDS.len(), n),
                proptest::collection::vec((0..n, 0..n), 0..(2 * n)),
                Just((1..=n as i64).collect::<Vec<_>>()).prop_shuffle(),
                proptest::collection::vec(any::<bool>(), n),
            )
        })
        .prop_map(|(kinds, edges, positions, done)| {
            let edges = edges.into_iter().filter(|(p, c)| p != c).collect();
            build_case(kinds, edges, positions, done)
        })
}

/// What the store would hold after the plan is written back.
fn apply(tasks: &[TaskRecord], order: &[TaskRecord], updates: &[TaskUpdate]) -> Vec<TaskRecord> {
    let by_id: BTreeMap<i64, &TaskUpdate> = updates.iter().map(|u| (u.id, u)).collect();
    let new_position: BTreeMap<i64, i64> = order
        .iter()
        .enumerate()
        .map(|(idx, t)| (t.id, idx as i64 + 1))
        .collect();
    let stamp = |current: Option<DateTime<Utc>>, change: TimestampChange| match change {
        TimestampChange::Keep => current,
        TimestampChange::Set(ts) => Some(ts),
        TimestampChange::Clear => None,
    };

    tasks
        .iter()
        .map(|t| {
            let mut t = t.clone();
            if let Some(u) = by_id.get(&t.id) {
                t.status = u.status.clone();
                t.status_reason = u.status_reason.clone();
                t.started_at = stamp(t.started_at, u.started_at);
                t.completed_at = stamp(t.completed_at, u.completed_at);
            }
            t.position = new_position[&t.id];
            t
        })
        .collect()
}

/// Gates that may fail, with the node kinds each one holds back.
const GATES: [(&str, &[&str]); 3] = [
    ("clean_tree", &KINDS),
    ("schema_applied", &["SCHEMA", "INSTRUMENT", "API", "UI", "TEST", "RUNBOOK"]),
    ("api_contract_exists", &["UI", "TEST", "RUNBOOK"]),
];

fn failing_gates(failing: &[bool]) -> GateResults {
    GATES
        .iter()
        .zip(failing)
        .filter(|(_, fails)| **fails)
        .map(|((gate, _), _)| (gate.to_string(), GateOutcome::fail(gate, "broken")))
        .collect()
}

/// Blockers for node `i`, from a boolean reachability matrix closed with
/// Warshall's algorithm.
fn expected_blockers(case: &Case, failing: &[bool]) -> Vec<Blockers> {
    let n = case.kinds.len();
    let index: BTreeMap<String, usize> = (0..n).map(|i| (key(i), i)).collect();
    let mut reach = vec![vec![false; n]; n];
    for (p, c) in case.edges.iter() {
        reach[index[p]][index[c]] = true;
    }
    let direct = reach.clone();
    for k in 0..n {
        for i in 0..n {
            if reach[i][k] {
                for j in 0..n {
                    if reach[k][j] {
                        reach[i][j] = true;
                    }
                }
            }
        }
    }

    (0..n)
        .map(|i| {
            let parents = (0..n)
                .filter(|&p| direct[p][i] && !case.done[p])
                .map(key)
                .collect();
            let spec = (0..n)
                .filter(|&a| a != i && reach[a][i] && !case.done[a])
                .filter(|&a| matches!(case.kinds[a], "ADR" | "SPEC"))
                .map(key)
                .collect();
            let requires = GATES
                .iter()
                .zip(failing)
                .filter(|((_, kinds), fails)| **fails && kinds.contains(&case.kinds[i]))
                .map(|((gate, _), _)| (gate.to_string(), String::new()))
                .collect();
            Blockers {
                parents,
                spec,
                requires,
            }
        })
        .collect()
}

fn index_of(order: &[TaskRecord], label: &str) -> usize {
    order
        .iter()
        .position(|t| t.label() == label)
        .unwrap_or(usize::MAX)
}

proptest! {
    #[test]
    fn order_respects_every_edge(case in dag_case(10)) {
        let plan = plan(Some(&case.spec), &case.tasks, &GateResults::new());

        prop_assert!(plan.cyclic.is_empty());
        for (parent, child) in case.edges.iter() {
            let p = index_of(&plan.order, &format!("T-{parent}"));
            let c = index_of(&plan.order, &format!("T-{child}"));
            prop_assert!(p < c, "{parent} placed after {child}");
        }
    }

    #[test]
    fn every_task_appears_exactly_once(case in any_graph_case(10)) {
        let plan = plan(Some(&case.spec), &case.tasks, &GateResults::new());

        let mut ids = plan.order_ids();
        ids.sort();
        let expected: Vec<i64> = (1..=case.tasks.len() as i64).collect();
        prop_assert_eq!(ids, expected);
    }

    #[test]
    fn without_graph_order_is_position_order(case in dag_case(10)) {
        let plan = plan(None, &case.tasks, &GateResults::new());

        let positions: Vec<i64> = plan.order.iter().map(|t| t.position).collect();
        let mut sorted = positions.clone();
        sorted.sort();
        prop_assert_eq!(positions, sorted);
    }

    #[test]
    fn second_pass_is_a_no_op(case in any_graph_case(8)) {
        let first = plan(Some(&case.spec), &case.tasks, &GateResults::new());
        let stored = apply(&case.tasks, &first.order, &first.updates);

        let second = plan(Some(&case.spec), &stored, &GateResults::new());

        prop_assert!(second.updates.is_empty(), "unexpected writes: {:?}", second.updates);
        prop_assert!(!second.needs_resequence());
        prop_assert_eq!(second.order_ids(), first.order_ids());
    }

    #[test]
    fn blocked_tasks_never_count_as_ready(case in dag_case(10)) {
        let plan = plan(Some(&case.spec), &case.tasks, &GateResults::new());

        let idx = plan.next_ready_index();
        if idx > 0 {
            let picked = &plan.order[idx - 1];
            let blocked = plan
                .update_for(picked.id)
                .is_some_and(|u| u.status.starts_with("blocked-dependency"));
            prop_assert!(!blocked);
        }
    }

    #[test]
    fn blocked_segments_match_reachability(
        case in any_graph_case(9),
        failing in proptest::collection::vec(any::<bool>(), GATES.len()),
    ) {
        let gates = failing_gates(&failing);
        let plan = plan(Some(&case.spec), &case.tasks, &gates);
        let expected = expected_blockers(&case, &failing);

        for (i, t) in case.tasks.iter().enumerate() {
            let status = plan
                .update_for(t.id)
                .map_or(t.status.clone(), |u| u.status.clone());
            let decoded = TaskStatus::decode(&status, &DoneSet::default());
            if case.done[i] {
                prop_assert!(decoded.is_done(), "{} should stay done, got {status}", key(i));
            } else if expected[i].is_empty() {
                prop_assert_eq!(decoded, TaskStatus::Pending, "{}", key(i));
            } else {
                prop_assert_eq!(&status, &expected[i].encode_status(), "{}", key(i));
                let blocked = TaskStatus::BlockedDependency(expected[i].clone());
                prop_assert_eq!(decoded, blocked, "{}", key(i));
            }
        }
    }
}
