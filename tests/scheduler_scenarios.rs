// tests/scheduler_scenarios.rs

mod common;
use crate::common::builders::{GraphBuilder, fixed_now, pending_tasks, task};
use crate::common::{init_tracing, plan};

use std::collections::{BTreeMap, BTreeSet};

use storydag::dag::{DagGraph, DoneSet, Scheduler, TaskStatus, bind_tasks};
use storydag::gates::{GateOutcome, GateResults, GateScopes};
use storydag::store::{TaskRecord, TimestampChange};

fn no_gates() -> GateResults {
    GateResults::new()
}

fn failing(gate: &str, detail: &str) -> GateResults {
    let mut gates = GateResults::new();
    gates.insert(gate.to_string(), GateOutcome::fail(gate, detail));
    gates
}

fn auto_blocked(mut t: TaskRecord, status: &str, reason: &str) -> TaskRecord {
    t.status = status.to_string();
    t.status_reason = Some(reason.to_string());
    t.started_at = Some(fixed_now());
    t
}

fn done(mut t: TaskRecord) -> TaskRecord {
    t.status = "done".to_string();
    t.started_at = Some(fixed_now());
    t.completed_at = Some(fixed_now());
    t
}

#[test]
fn chain_blocks_each_child_on_its_parent() {
    init_tracing();

    let spec = GraphBuilder::new("story")
        .node("A", "API", "first")
        .node("B", "API", "second")
        .node("C", "API", "third")
        .edge("A", "B")
        .edge("B", "C")
        .build();
    let tasks = pending_tasks(&["A", "B", "C"]);

    let plan = plan(Some(&spec), &tasks, &no_gates());

    assert_eq!(plan.order_labels(), vec!["A", "B", "C"]);
    assert!(plan.update_for(1).is_none(), "A stays pending");

    let b = plan.update_for(2).expect("B is blocked");
    assert_eq!(b.status, "blocked-dependency(parents=A)");
    assert_eq!(b.status_reason.as_deref(), Some("dag:auto; parents=A"));
    assert_eq!(b.started_at, TimestampChange::Set(fixed_now()));
    assert_eq!(b.completed_at, TimestampChange::Keep);

    let c = plan.update_for(3).expect("C is blocked");
    assert_eq!(c.status, "blocked-dependency(parents=B)");

    assert_eq!(plan.next_ready_index(), 1);
}

#[test]
fn finishing_a_parent_resets_only_its_direct_child() {
    let spec = GraphBuilder::new("story")
        .node("A", "API", "first")
        .node("B", "API", "second")
        .node("C", "API", "third")
        .edge("A", "B")
        .edge("B", "C")
        .build();
    let mut tasks = pending_tasks(&["A", "B", "C"]);
    tasks[0] = done(tasks[0].clone());
    tasks[1] = auto_blocked(
        tasks[1].clone(),
        "blocked-dependency(parents=A)",
        "dag:auto; parents=A",
    );
    tasks[2] = auto_blocked(
        tasks[2].clone(),
        "blocked-dependency(parents=B)",
        "dag:auto; parents=B",
    );

    let plan = plan(Some(&spec), &tasks, &no_gates());

    let b = plan.update_for(2).expect("B resets");
    assert_eq!(b.status, "pending");
    assert_eq!(b.status_reason, None);
    assert_eq!(b.started_at, TimestampChange::Clear);
    assert_eq!(b.completed_at, TimestampChange::Clear);

    assert!(plan.update_for(3).is_none(), "C already carries the right block");
    assert!(plan.update_for(1).is_none(), "done task with timestamps is untouched");
    assert_eq!(plan.updates.len(), 1);
    assert_eq!(plan.next_ready_index(), 2);
    assert_eq!(plan.completed_count(), 1);
}

#[test]
fn failing_gate_blocks_scoped_kinds_with_detail() {
    let spec = GraphBuilder::new("story")
        .node("SCHEMA01", "SCHEMA", "tables")
        .requires("clean_tree")
        .build();
    let tasks = pending_tasks(&["S01-SCHEMA01"]);

    let plan = plan(Some(&spec), &tasks, &failing("clean_tree", "M src/lib.rs | ?? notes.txt"));

    let update = plan.update_for(1).expect("blocked by gate");
    assert_eq!(update.status, "blocked-dependency(requires=clean_tree)");
    let reason = update.status_reason.as_deref().unwrap_or_default();
    assert!(reason.starts_with("dag:auto"));
    assert!(reason.contains("clean_tree (M src/lib.rs | ?? notes.txt)"), "reason: {reason}");
    assert_eq!(plan.next_ready_index(), 0);
}

#[test]
fn unfinished_adr_blocks_transitive_descendants() {
    let spec = GraphBuilder::new("story")
        .node("ADR01", "ADR", "decision")
        .node("SCHEMA01", "SCHEMA", "tables")
        .node("API01", "API", "endpoint")
        .edge("ADR01", "SCHEMA01")
        .edge("SCHEMA01", "API01")
        .build();
    let mut tasks = pending_tasks(&["S01-ADR01", "S01-SCHEMA01", "S01-API01"]);
    tasks[1] = done(tasks[1].clone());

    let plan = plan(Some(&spec), &tasks, &no_gates());

    let api = plan.update_for(3).expect("API01 is blocked");
    assert_eq!(api.status, "blocked-dependency(spec=ADR01)");
    assert_eq!(
        plan.projected_status(3),
        Some(&TaskStatus::decode("blocked-dependency(spec=ADR01)", &DoneSet::default()))
    );
}

#[test]
fn parent_and_spec_segments_are_sorted_and_combined() {
    let spec = GraphBuilder::new("story")
        .node("SPEC02", "SPEC", "spec b")
        .node("SPEC01", "SPEC", "spec a")
        .node("UI01", "UI", "screen")
        .edge("SPEC02", "UI01")
        .edge("SPEC01", "UI01")
        .requires("schema_applied")
        .build();
    let tasks = pending_tasks(&["T-SPEC02", "T-SPEC01", "T-UI01"]);

    let gates = failing("schema_applied", "missing schema file db/schema.sql");
    let plan = plan(Some(&spec), &tasks, &gates);

    let ui = plan.update_for(3).expect("UI01 blocked");
    assert_eq!(
        ui.status,
        "blocked-dependency(parents=SPEC01,SPEC02;spec=SPEC01,SPEC02;requires=schema_applied)"
    );
    assert!(plan.update_for(1).is_none(), "schema_applied does not apply to SPEC nodes");
}

#[test]
fn cyclic_graph_falls_back_to_position_order() {
    init_tracing();

    let spec = GraphBuilder::new("story")
        .node("A01", "API", "a")
        .node("B02", "API", "b")
        .edge("A01", "B02")
        .edge("B02", "A01")
        .build();
    let tasks = vec![task(10, 1, "S-B02", "pending"), task(11, 2, "S-A01", "pending")];

    let plan = plan(Some(&spec), &tasks, &no_gates());

    assert_eq!(plan.order_labels(), vec!["S-B02", "S-A01"]);
    assert_eq!(plan.cyclic.len(), 2);
    let status = |id: i64| plan.update_for(id).map(|u| u.status.as_str());
    assert_eq!(status(10), Some("blocked-dependency(parents=A01)"));
    assert_eq!(status(11), Some("blocked-dependency(parents=B02)"));
}

#[test]
fn spec_ancestor_reached_through_a_cycle_still_blocks() {
    init_tracing();

    // C01 -> A01 -> B01 -> C01 is a cycle; D01 hangs off B01.
    let spec = GraphBuilder::new("story")
        .node("A01", "API", "a")
        .node("B01", "API", "b")
        .node("C01", "SPEC", "c")
        .node("D01", "UI", "d")
        .edge("C01", "A01")
        .edge("A01", "B01")
        .edge("B01", "C01")
        .edge("B01", "D01")
        .build();
    let tasks = pending_tasks(&["S-A01", "S-B01", "S-C01", "S-D01"]);

    let graph = DagGraph::from_spec(&spec);
    let ancestors = graph.ancestors();
    for key in ["A01", "B01", "C01", "D01"] {
        assert_eq!(ancestors[key], graph.ancestors_of(key), "{key}");
    }
    let expected: BTreeSet<String> = ["A01", "B01", "C01"].iter().map(|s| s.to_string()).collect();
    assert_eq!(ancestors["D01"], expected);

    let plan = plan(Some(&spec), &tasks, &no_gates());

    let status = |id: i64| plan.update_for(id).map(|u| u.status.clone());
    assert_eq!(status(1).as_deref(), Some("blocked-dependency(parents=C01;spec=C01)"));
    assert_eq!(status(2).as_deref(), Some("blocked-dependency(parents=A01;spec=C01)"));
    assert_eq!(status(3).as_deref(), Some("blocked-dependency(parents=B01)"));
    assert_eq!(status(4).as_deref(), Some("blocked-dependency(parents=B01;spec=C01)"));
}

#[test]
fn without_graph_tasks_keep_position_order() {
    let tasks = vec![
        task(1, 3, "S-T03", "pending"),
        task(2, 1, "S-T01", "done"),
        task(3, 2, "S-T02", "in-progress"),
    ];

    let plan = plan(None, &tasks, &no_gates());

    assert_eq!(plan.order_ids(), vec![2, 3, 1]);
    assert!(!plan.needs_resequence());
    // The done row has no completed_at yet, so it is the only write.
    assert_eq!(plan.updates.len(), 1);
    assert_eq!(plan.updates[0].completed_at, TimestampChange::Set(fixed_now()));
    assert_eq!(plan.updates[0].status, "done");
}

#[test]
fn externally_set_statuses_are_never_modified() {
    let spec = GraphBuilder::new("story")
        .node("API01", "API", "a")
        .node("API02", "API", "b")
        .node("API03", "API", "c")
        .edge("API01", "API02")
        .edge("API01", "API03")
        .build();
    let mut tasks = pending_tasks(&["S-API01", "S-API02", "S-API03"]);
    tasks[1].status = "on-hold".to_string();
    // Looks like ours but lacks the marker.
    tasks[2].status = "blocked-dependency(parents=API01)".to_string();
    tasks[2].status_reason = Some("waiting on vendor".to_string());

    let plan = plan(Some(&spec), &tasks, &no_gates());

    assert!(plan.update_for(2).is_none());
    assert!(plan.update_for(3).is_none());
}

#[test]
fn stale_auto_block_on_unbound_task_resets_to_pending() {
    let spec = GraphBuilder::new("story").node("API01", "API", "a").build();
    let tasks = vec![auto_blocked(
        task(1, 1, "S-UI09", "pending"),
        "blocked-dependency(parents=UI08)",
        "dag:auto; parents=UI08",
    )];

    let plan = plan(Some(&spec), &tasks, &no_gates());

    let update = plan.update_for(1).expect("reset");
    assert_eq!(update.status, "pending");
    assert_eq!(update.started_at, TimestampChange::Clear);
}

#[test]
fn ready_nodes_are_ordered_by_kind_then_children_then_position() {
    let spec = GraphBuilder::new("story")
        .node("TEST01", "TEST", "tests")
        .node("API02", "API", "leaf endpoint")
        .node("API01", "API", "endpoint with a screen")
        .node("UI01", "UI", "screen")
        .node("SCHEMA01", "SCHEMA", "tables")
        .node("ADR01", "ADR", "decision")
        .edge("API01", "UI01")
        .build();
    let tasks = vec![
        task(1, 1, "S-TEST01", "pending"),
        task(2, 2, "S-API02", "pending"),
        task(3, 3, "S-API01", "pending"),
        task(4, 4, "S-UI01", "pending"),
        task(5, 5, "S-SCHEMA01", "pending"),
        task(6, 6, "S-ADR01", "pending"),
        task(7, 7, "S-NOTE", "pending"),
    ];

    let plan = plan(Some(&spec), &tasks, &no_gates());

    assert_eq!(
        plan.order_labels(),
        vec!["S-ADR01", "S-SCHEMA01", "S-API01", "S-API02", "S-UI01", "S-TEST01", "S-NOTE"]
    );
    assert!(plan.needs_resequence());
}

#[test]
fn first_task_in_position_order_keeps_a_contested_node() {
    init_tracing();

    let spec = GraphBuilder::new("story").node("API01", "API", "a").build();
    let tasks = vec![task(1, 2, "OLD-API01", "pending"), task(2, 1, "NEW-API01", "pending")];

    let binding = bind_tasks(&tasks, &spec);

    assert_eq!(binding.node_of(2), Some("API01"));
    assert_eq!(binding.node_of(1), None);
    assert_eq!(binding.conflicts.len(), 1);
    assert_eq!(binding.conflicts[0].bound_to, "NEW-API01");
    assert_eq!(binding.conflicts[0].rejected, "OLD-API01");
}

#[test]
fn alias_binding_beats_suffix_binding() {
    let spec = GraphBuilder::new("story")
        .node("API01", "API", "a")
        .node("API02", "API", "b")
        .alias("API02", "legacy-api01")
        .build();
    let tasks = vec![task(1, 1, "LEGACY-API01", "pending")];

    let binding = bind_tasks(&tasks, &spec);

    assert_eq!(binding.node_of(1), Some("API02"));
    assert!(binding.conflicts.is_empty());
}

#[test]
fn suffix_binding_requires_a_word_boundary() {
    let spec = GraphBuilder::new("story").node("API01", "API", "a").build();
    let tasks = vec![task(1, 1, "XAPI01", "pending"), task(2, 2, "s1_api01", "pending")];

    let binding = bind_tasks(&tasks, &spec);

    assert_eq!(binding.node_of(1), None);
    assert_eq!(binding.node_of(2), Some("API01"));
}

#[test]
fn scope_override_narrows_a_gate() {
    let spec = GraphBuilder::new("story")
        .node("API01", "API", "a")
        .node("UI01", "UI", "b")
        .requires("clean_tree")
        .build();
    let tasks = pending_tasks(&["S-API01", "S-UI01"]);
    let mut overrides = BTreeMap::new();
    overrides.insert("clean_tree".to_string(), vec![storydag::types::NodeKind::Ui]);
    let scopes = GateScopes::new(overrides);
    let done = DoneSet::default();

    let gates = failing("clean_tree", "M a");
    let plan = Scheduler::new(Some(&spec), &done, &scopes).plan(&tasks, &gates, fixed_now());

    assert!(plan.update_for(1).is_none());
    assert_eq!(
        plan.update_for(2).map(|u| u.status.as_str()),
        Some("blocked-dependency(requires=clean_tree)")
    );
}

#[test]
fn custom_done_literals_unblock_children() {
    let spec = GraphBuilder::new("story")
        .node("API01", "API", "a")
        .node("API02", "API", "b")
        .edge("API01", "API02")
        .build();
    let mut tasks = pending_tasks(&["S-API01", "S-API02"]);
    tasks[0].status = "Shipped".to_string();
    tasks[0].completed_at = Some(fixed_now());
    let done = DoneSet::new(["shipped"]);
    let scopes = GateScopes::default();

    let plan = Scheduler::new(Some(&spec), &done, &scopes).plan(&tasks, &no_gates(), fixed_now());

    assert!(plan.updates.is_empty());
    assert_eq!(plan.completed_count(), 1);
}
