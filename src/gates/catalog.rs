// src/gates/catalog.rs

use std::collections::BTreeMap;

use crate::config::ConfigFile;
use crate::types::{GateName, NodeKind};

pub const NO_REJ: &str = "no_rej";
pub const CLEAN_TREE: &str = "clean_tree";
pub const SCHEMA_APPLIED: &str = "schema_applied";
pub const API_CONTRACT_EXISTS: &str = "api_contract_exists";

/// Every gate the evaluator knows how to run.
pub const CATALOG: [&str; 4] = [NO_REJ, CLEAN_TREE, SCHEMA_APPLIED, API_CONTRACT_EXISTS];

pub fn is_catalog_gate(name: &str) -> bool {
    CATALOG.contains(&name)
}

/// Built-in scope of a gate. Gates without a declared scope (including
/// unknown ones) apply to every kind.
fn default_applies(gate: &str, kind: &NodeKind) -> bool {
    match gate {
        SCHEMA_APPLIED => matches!(
            kind,
            NodeKind::Schema
                | NodeKind::Instrument
                | NodeKind::Api
                | NodeKind::Ui
                | NodeKind::Test
                | NodeKind::Runbook
        ),
        API_CONTRACT_EXISTS => matches!(kind, NodeKind::Ui | NodeKind::Test | NodeKind::Runbook),
        _ => true,
    }
}

/// Gate → applicable node kinds, with `[gates.scope]` overrides applied.
#[derive(Debug, Clone, Default)]
pub struct GateScopes {
    overrides: BTreeMap<GateName, Vec<NodeKind>>,
}

impl GateScopes {
    pub fn new(overrides: BTreeMap<GateName, Vec<NodeKind>>) -> Self {
        Self { overrides }
    }

    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self::new(cfg.scope_overrides().clone())
    }

    pub fn applies(&self, gate: &str, kind: &NodeKind) -> bool {
        match self.overrides.get(gate) {
            Some(kinds) => kinds.contains(kind),
            None => default_applies(gate, kind),
        }
    }
}
