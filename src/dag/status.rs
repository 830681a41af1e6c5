// src/dag/status.rs

//! Task status grammar.
//!
//! Status strings are decoded into [`TaskStatus`] when rows are read and
//! encoded back only when an update is written, so scheduling logic never
//! pattern-matches its own output.
//!
//! ```text
//! pending
//! <done literal>                                   e.g. done, completed
//! blocked-dependency(parents=A,B;spec=C;requires=clean_tree)
//! <anything else>                                  owned by other tools
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::{GateName, NodeKey};

/// Prefix of every reason this scheduler writes.
pub const DAG_AUTO_MARKER: &str = "dag:auto";

pub const PENDING: &str = "pending";

const BLOCKED_NAME: &str = "blocked-dependency";

static BLOCKED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i:blocked-dependency)\(([^()]*)\)$").expect("static regex")
});

/// The closed set of status literals that mean "done" (compared
/// case-insensitively).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoneSet {
    literals: Vec<String>,
}

impl DoneSet {
    pub fn new<I, S>(literals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            literals: literals
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, status: &str) -> bool {
        let status = status.trim().to_lowercase();
        self.literals.iter().any(|l| *l == status)
    }
}

impl Default for DoneSet {
    fn default() -> Self {
        Self::new(["done", "completed", "complete", "closed"])
    }
}

/// Everything currently holding a task back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blockers {
    /// Direct parents whose task is missing or not done.
    pub parents: BTreeSet<NodeKey>,
    /// ADR/SPEC ancestors (at any depth) whose task is missing or not done.
    pub spec: BTreeSet<NodeKey>,
    /// Failing gates scoped to the task's node kind, with their detail.
    pub requires: BTreeMap<GateName, String>,
}

impl Blockers {
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty() && self.spec.is_empty() && self.requires.is_empty()
    }

    /// `blocked-dependency(parents=..;spec=..;requires=..)`, empty segments
    /// omitted, members sorted.
    pub fn encode_status(&self) -> String {
        let segments = self.segments(false);
        format!("{BLOCKED_NAME}({})", segments.join(";"))
    }

    /// `dag:auto; parents=..; spec=..; requires=gate (detail)`.
    pub fn reason(&self) -> String {
        let mut out = String::from(DAG_AUTO_MARKER);
        for segment in self.segments(true) {
            let _ = write!(out, "; {segment}");
        }
        out
    }

    fn segments(&self, with_detail: bool) -> Vec<String> {
        let mut segments = Vec::new();
        if !self.parents.is_empty() {
            segments.push(format!("parents={}", join(self.parents.iter())));
        }
        if !self.spec.is_empty() {
            segments.push(format!("spec={}", join(self.spec.iter())));
        }
        if !self.requires.is_empty() {
            let gates = self.requires.iter().map(|(gate, detail)| {
                let detail = sanitize_detail(detail);
                if with_detail && !detail.is_empty() {
                    format!("{gate} ({detail})")
                } else {
                    gate.clone()
                }
            });
            segments.push(format!("requires={}", join(gates)));
        }
        segments
    }
}

fn join<I, S>(items: I) -> String
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    items.map(|s| s.as_ref().to_string()).collect::<Vec<_>>().join(",")
}

/// Keep gate details on one line and free of the reason's separators.
fn sanitize_detail(detail: &str) -> String {
    detail
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
        .replace(';', ",")
}

/// Decoded task status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// `pending`, or no status at all.
    Pending,
    /// One of the done literals, as stored.
    Done(String),
    /// A well-formed blocked-dependency status. Gate details live in the
    /// reason, so `requires` values are empty here.
    BlockedDependency(Blockers),
    /// A status owned by someone else; never touched.
    Other(String),
}

impl TaskStatus {
    pub fn decode(raw: &str, done: &DoneSet) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(PENDING) {
            return TaskStatus::Pending;
        }
        if done.contains(trimmed) {
            return TaskStatus::Done(trimmed.to_string());
        }
        if let Some(caps) = BLOCKED_RE.captures(trimmed) {
            return TaskStatus::BlockedDependency(decode_segments(&caps[1]));
        }
        TaskStatus::Other(trimmed.to_string())
    }

    pub fn encode(&self) -> String {
        match self {
            TaskStatus::Pending => PENDING.to_string(),
            TaskStatus::Done(s) | TaskStatus::Other(s) => s.clone(),
            TaskStatus::BlockedDependency(b) => b.encode_status(),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, TaskStatus::Done(_))
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, TaskStatus::BlockedDependency(_))
    }
}

fn decode_segments(body: &str) -> Blockers {
    let mut blockers = Blockers::default();
    for segment in body.split(';') {
        let Some((name, members)) = segment.split_once('=') else {
            continue;
        };
        let members = members
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(String::from);
        match name.trim() {
            "parents" => blockers.parents.extend(members),
            "spec" => blockers.spec.extend(members),
            "requires" => blockers
                .requires
                .extend(members.map(|gate| (gate, String::new()))),
            _ => {}
        }
    }
    blockers
}

/// Whether a reason was written by this scheduler.
pub fn is_auto_reason(reason: Option<&str>) -> bool {
    reason.is_some_and(|r| r.trim_start().starts_with(DAG_AUTO_MARKER))
}

/// Turn a `dag:auto` reason into readable detail lines. `None` for reasons
/// written by someone else.
pub fn explain_reason(reason: &str) -> Option<Vec<String>> {
    let body = reason.trim_start().strip_prefix(DAG_AUTO_MARKER)?;
    let lines = body
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|segment| match segment.split_once('=') {
            Some(("parents", v)) => format!("waiting on parent tasks: {}", spaced(v)),
            Some(("spec", v)) => format!("waiting on unfinished ADR/SPEC ancestors: {}", spaced(v)),
            Some(("requires", v)) => format!("readiness gates failing: {}", spaced(v)),
            _ => segment.to_string(),
        })
        .collect();
    Some(lines)
}

fn spaced(members: &str) -> String {
    members.split(',').map(str::trim).collect::<Vec<_>>().join(", ")
}
