// src/types.rs

use std::fmt;

use serde::Deserialize;

/// Canonical (upper-cased) graph node key, e.g. `"ADR01"`.
pub type NodeKey = String;

/// Name of a readiness gate, e.g. `"clean_tree"`.
pub type GateName = String;

/// Kind tag carried by every graph node.
///
/// The order of the variants mirrors the scheduling priority: design
/// artifacts first, operational docs last, unknown kinds after everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Adr,
    Spec,
    Schema,
    Instrument,
    Api,
    Ui,
    Test,
    Runbook,
    /// Any kind outside the known catalog, kept upper-cased.
    Other(String),
}

impl NodeKind {
    /// Priority rank used as the first tie-break of the topological order.
    pub fn rank(&self) -> u8 {
        match self {
            NodeKind::Adr | NodeKind::Spec => 0,
            NodeKind::Schema => 1,
            NodeKind::Instrument => 2,
            NodeKind::Api => 3,
            NodeKind::Ui => 4,
            NodeKind::Test => 5,
            NodeKind::Runbook => 6,
            NodeKind::Other(_) => 7,
        }
    }

    /// ADR and SPEC nodes block every descendant until done.
    pub fn is_spec_like(&self) -> bool {
        matches!(self, NodeKind::Adr | NodeKind::Spec)
    }

    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Adr => "ADR",
            NodeKind::Spec => "SPEC",
            NodeKind::Schema => "SCHEMA",
            NodeKind::Instrument => "INSTRUMENT",
            NodeKind::Api => "API",
            NodeKind::Ui => "UI",
            NodeKind::Test => "TEST",
            NodeKind::Runbook => "RUNBOOK",
            NodeKind::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl NodeKind {
    /// Parse a kind label case-insensitively; unknown labels become `Other`.
    pub fn parse(s: &str) -> NodeKind {
        let upper = s.trim().to_uppercase();
        match upper.as_str() {
            "ADR" => NodeKind::Adr,
            "SPEC" => NodeKind::Spec,
            "SCHEMA" => NodeKind::Schema,
            "INSTRUMENT" => NodeKind::Instrument,
            "API" => NodeKind::Api,
            "UI" => NodeKind::Ui,
            "TEST" => NodeKind::Test,
            "RUNBOOK" => NodeKind::Runbook,
            _ => NodeKind::Other(upper),
        }
    }
}

/// What to do when a gate check itself errors out (subprocess or IO failure).
///
/// - `FailOpen`: record the gate as passing (default).
/// - `FailClosed`: record the gate as failing with the error as detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnGateError {
    FailOpen,
    FailClosed,
}

impl Default for OnGateError {
    fn default() -> Self {
        OnGateError::FailOpen
    }
}
