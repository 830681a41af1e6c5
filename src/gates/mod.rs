// src/gates/mod.rs

//! Readiness gates.
//!
//! - [`catalog`] names the known gates and the node kinds each applies to.
//! - [`command`] is the subprocess seam gates shell out through.
//! - [`evaluator`] runs the checks for one story.

pub mod catalog;
pub mod command;
pub mod evaluator;

use std::collections::BTreeMap;

use crate::types::GateName;

pub use catalog::{GateScopes, is_catalog_gate};
pub use command::{
    CommandFuture, CommandOutput, CommandRunner, CommandSpec, TokioCommandRunner,
};
pub use evaluator::GateEvaluator;

/// Verdict of one gate for one scheduling pass. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateOutcome {
    pub gate: GateName,
    pub ok: bool,
    pub detail: String,
}

impl GateOutcome {
    pub fn pass(gate: &str, detail: impl Into<String>) -> Self {
        Self {
            gate: gate.to_string(),
            ok: true,
            detail: detail.into(),
        }
    }

    pub fn fail(gate: &str, detail: impl Into<String>) -> Self {
        Self {
            gate: gate.to_string(),
            ok: false,
            detail: detail.into(),
        }
    }
}

/// Gate outcomes of one story, keyed by gate name.
pub type GateResults = BTreeMap<GateName, GateOutcome>;
