// tests/status_grammar.rs

use std::collections::{BTreeMap, BTreeSet};

use storydag::dag::{Blockers, DoneSet, TaskStatus, explain_reason, is_auto_reason};

fn blockers(parents: &[&str], spec: &[&str], requires: &[(&str, &str)]) -> Blockers {
    Blockers {
        parents: parents.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
        spec: spec.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
        requires: requires
            .iter()
            .map(|(g, d)| (g.to_string(), d.to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

#[test]
fn test_pending_and_empty_decode_to_pending() {
    let done = DoneSet::default();
    assert_eq!(TaskStatus::decode("", &done), TaskStatus::Pending);
    assert_eq!(TaskStatus::decode("  PENDING ", &done), TaskStatus::Pending);
    assert_eq!(TaskStatus::Pending.encode(), "pending");
}

#[test]
fn test_done_literals_are_case_insensitive_and_kept_verbatim() {
    let done = DoneSet::default();
    let status = TaskStatus::decode("Completed", &done);
    assert!(status.is_done());
    assert_eq!(status.encode(), "Completed");
    assert!(!TaskStatus::decode("finished", &done).is_done());
}

#[test]
fn test_blocked_status_decodes_segments() {
    let done = DoneSet::default();
    let status = TaskStatus::decode(
        "blocked-dependency(parents=API01,SCHEMA01;spec=ADR01;requires=clean_tree)",
        &done,
    );

    let TaskStatus::BlockedDependency(b) = status else {
        panic!("expected blocked status, got {status:?}");
    };
    assert_eq!(b.parents.iter().cloned().collect::<Vec<_>>(), vec!["API01", "SCHEMA01"]);
    assert_eq!(b.spec.iter().cloned().collect::<Vec<_>>(), vec!["ADR01"]);
    assert!(b.requires.contains_key("clean_tree"));
}

#[test]
fn test_malformed_blocked_status_is_foreign() {
    let done = DoneSet::default();
    assert!(matches!(
        TaskStatus::decode("blocked-dependency(parents=A01", &done),
        TaskStatus::Other(_)
    ));
    assert!(matches!(TaskStatus::decode("blocked", &done), TaskStatus::Other(_)));
    assert!(matches!(TaskStatus::decode("in-progress", &done), TaskStatus::Other(_)));
}

#[test]
fn test_encode_omits_empty_segments_and_sorts_members() {
    let b = blockers(&["UI02", "API01"], &[], &[("no_rej", "found a.rej")]);
    assert_eq!(b.encode_status(), "blocked-dependency(parents=API01,UI02;requires=no_rej)");

    let decoded = TaskStatus::decode(&b.encode_status(), &DoneSet::default());
    assert_eq!(decoded.encode(), b.encode_status());
}

#[test]
fn test_reason_carries_marker_and_single_line_details() {
    let b = blockers(
        &["API01"],
        &["ADR01"],
        &[("clean_tree", "M a.rs\n?? b.rs"), ("schema_applied", "no migration mentions x; y")],
    );

    let reason = b.reason();

    assert_eq!(
        reason,
        "dag:auto; parents=API01; spec=ADR01; \
         requires=clean_tree (M a.rs | ?? b.rs),schema_applied (no migration mentions x, y)"
    );
    assert!(is_auto_reason(Some(&reason)));
    assert!(!reason.contains('\n'));
}

#[test]
fn test_auto_reason_detection() {
    assert!(is_auto_reason(Some("dag:auto; parents=A01")));
    assert!(!is_auto_reason(Some("waiting on legal")));
    assert!(!is_auto_reason(None));
}

#[test]
fn test_explain_reason_renders_each_segment() {
    let lines = explain_reason("dag:auto; parents=API01,UI01; spec=ADR01; requires=clean_tree")
        .expect("auto reason");
    assert_eq!(
        lines,
        vec![
            "waiting on parent tasks: API01, UI01".to_string(),
            "waiting on unfinished ADR/SPEC ancestors: ADR01".to_string(),
            "readiness gates failing: clean_tree".to_string(),
        ]
    );
    assert!(explain_reason("manual hold").is_none());
}

#[test]
fn test_custom_done_set_ignores_blank_literals() {
    let done = DoneSet::new(["Shipped", " ", "merged"]);
    assert!(done.contains("shipped"));
    assert!(done.contains("MERGED"));
    assert!(!done.contains("done"));
    assert!(!done.contains(""));
}
