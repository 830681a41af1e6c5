// src/config/validate.rs

use std::collections::BTreeMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, StorydagError};
use crate::gates::catalog::is_catalog_gate;
use crate::types::{GateName, NodeKind};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::StorydagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        let scopes = parse_scope_overrides(&raw)?;
        Ok(ConfigFile::new_unchecked(raw, scopes))
    }
}

/// Check the semantic invariants of a raw config.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_paths(cfg)?;
    validate_done_set(cfg)?;
    validate_gate_settings(cfg)?;
    Ok(())
}

fn validate_paths(cfg: &RawConfigFile) -> Result<()> {
    if cfg.paths.graph_dir.trim().is_empty() {
        return Err(StorydagError::ConfigError(
            "[paths].graph_dir must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_done_set(cfg: &RawConfigFile) -> Result<()> {
    if cfg.status.done.iter().all(|s| s.trim().is_empty()) {
        return Err(StorydagError::ConfigError(
            "[status].done must list at least one status".to_string(),
        ));
    }
    if let Some(bad) = cfg
        .status
        .done
        .iter()
        .find(|s| s.trim().eq_ignore_ascii_case("pending"))
    {
        return Err(StorydagError::ConfigError(format!(
            "[status].done cannot contain '{bad}'"
        )));
    }
    Ok(())
}

fn validate_gate_settings(cfg: &RawConfigFile) -> Result<()> {
    if cfg.gates.command_timeout_secs == 0 {
        return Err(StorydagError::ConfigError(
            "[gates].command_timeout_secs must be >= 1 (got 0)".to_string(),
        ));
    }
    for gate in cfg.gates.scope.keys() {
        if !is_catalog_gate(gate) {
            return Err(StorydagError::ConfigError(format!(
                "[gates.scope] names unknown gate '{gate}'"
            )));
        }
    }
    if cfg.gates.schema_applied.keywords.is_empty() {
        return Err(StorydagError::ConfigError(
            "[gates.schema_applied].keywords must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn parse_scope_overrides(cfg: &RawConfigFile) -> Result<BTreeMap<GateName, Vec<NodeKind>>> {
    let mut out = BTreeMap::new();
    for (gate, kinds) in cfg.gates.scope.iter() {
        let mut parsed = Vec::with_capacity(kinds.len());
        for kind in kinds {
            if kind.trim().is_empty() {
                return Err(StorydagError::ConfigError(format!(
                    "[gates.scope].{gate} contains an empty kind"
                )));
            }
            parsed.push(NodeKind::parse(kind));
        }
        out.insert(gate.clone(), parsed);
    }
    Ok(out)
}
