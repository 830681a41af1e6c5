// src/gates/evaluator.rs

//! Runs the gate catalog for one story.
//!
//! Every gate in a story's `ready_requires` is evaluated once, in order,
//! before any task status is written. Unknown gate names pass. A gate that
//! errors (unreadable file, failed spawn, timeout) is resolved through the
//! configured [`OnGateError`] policy.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::fs::{FileSystem, relative_display, walk_files};
use crate::gates::catalog::{API_CONTRACT_EXISTS, CLEAN_TREE, NO_REJ, SCHEMA_APPLIED};
use crate::gates::command::{CommandRunner, CommandSpec};
use crate::gates::{GateOutcome, GateResults};
use crate::types::{GateName, OnGateError};

/// Status lines quoted in a failing `clean_tree` detail.
const CLEAN_TREE_DETAIL_LINES: usize = 5;

static CAMEL_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("static regex"));

/// Evaluates gates against one project tree.
#[derive(Debug, Clone, Copy)]
pub struct GateEvaluator<'a> {
    fs: &'a dyn FileSystem,
    runner: &'a dyn CommandRunner,
    config: &'a ConfigFile,
    root: &'a Path,
}

impl<'a> GateEvaluator<'a> {
    pub fn new(
        fs: &'a dyn FileSystem,
        runner: &'a dyn CommandRunner,
        config: &'a ConfigFile,
        root: &'a Path,
    ) -> Self {
        Self {
            fs,
            runner,
            config,
            root,
        }
    }

    /// Evaluate each distinct gate name once.
    pub async fn evaluate(&self, gates: &[GateName]) -> GateResults {
        let mut results = GateResults::new();
        for gate in gates {
            if results.contains_key(gate) {
                continue;
            }
            let outcome = match self.check(gate).await {
                Ok(outcome) => outcome,
                Err(err) => self.on_error(gate, err),
            };
            if outcome.ok {
                debug!(gate = %gate, detail = %outcome.detail, "gate passed");
            } else {
                info!(gate = %gate, detail = %outcome.detail, "gate failed");
            }
            results.insert(gate.clone(), outcome);
        }
        results
    }

    fn on_error(&self, gate: &str, err: anyhow::Error) -> GateOutcome {
        match self.config.gates().on_error {
            OnGateError::FailOpen => {
                warn!(gate = %gate, error = %format!("{err:#}"), "gate errored; passing");
                GateOutcome::pass(gate, format!("gate error ignored: {err:#}"))
            }
            OnGateError::FailClosed => {
                warn!(gate = %gate, error = %format!("{err:#}"), "gate errored; failing");
                GateOutcome::fail(gate, format!("gate error: {err:#}"))
            }
        }
    }

    async fn check(&self, gate: &str) -> Result<GateOutcome> {
        match gate {
            NO_REJ => self.no_rej(),
            CLEAN_TREE => self.clean_tree().await,
            SCHEMA_APPLIED => self.schema_applied().await,
            API_CONTRACT_EXISTS => self.api_contract_exists(),
            other => {
                debug!(gate = %other, "unknown gate; passing");
                Ok(GateOutcome::pass(other, "unknown gate"))
            }
        }
    }

    fn no_rej(&self) -> Result<GateOutcome> {
        let rejects = build_globset(&["**/*.rej".to_string()])?;
        let files = walk_files(self.fs, self.root, &self.config.gates().skip_dirs)?;
        let found = files
            .iter()
            .map(|p| relative_display(self.root, p))
            .find(|rel| rejects.is_match(rel));
        Ok(match found {
            Some(rel) => GateOutcome::fail(NO_REJ, format!("found {rel}")),
            None => GateOutcome::pass(NO_REJ, "no reject files"),
        })
    }

    async fn clean_tree(&self) -> Result<GateOutcome> {
        let spec = CommandSpec::new("git", ["status", "--porcelain"], self.root);
        let output = self.runner.run(spec).await?;
        if !output.success {
            anyhow::bail!("git status failed: {}", output.combined());
        }

        let dirty: Vec<&str> = output
            .stdout
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.trim().is_empty())
            .collect();
        if dirty.is_empty() {
            return Ok(GateOutcome::pass(CLEAN_TREE, "working tree clean"));
        }
        let shown = dirty
            .iter()
            .take(CLEAN_TREE_DETAIL_LINES)
            .map(|l| l.trim())
            .collect::<Vec<_>>()
            .join(" | ");
        Ok(GateOutcome::fail(CLEAN_TREE, shown))
    }

    async fn schema_applied(&self) -> Result<GateOutcome> {
        let section = &self.config.gates().schema_applied;

        if let Some(script) = section.guard_script.as_deref() {
            let script_path = self.root.join(script);
            if self.fs.is_file(&script_path) {
                let script = script_path.to_string_lossy().into_owned();
                let spec = CommandSpec::new("sh", [script.clone()], self.root);
                let output = self.runner.run(spec).await?;
                if output.success {
                    return Ok(GateOutcome::pass(SCHEMA_APPLIED, format!("guard {script} passed")));
                }
                let detail = match output.combined() {
                    d if d.is_empty() => format!(
                        "guard {script} exited with status {}",
                        output.code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
                    ),
                    d => d,
                };
                return Ok(GateOutcome::fail(SCHEMA_APPLIED, detail));
            }
        }

        if !self.fs.is_file(&self.root.join(&section.schema_file)) {
            return Ok(GateOutcome::fail(
                SCHEMA_APPLIED,
                format!("missing schema file {}", section.schema_file),
            ));
        }

        let migrations_dir = self.root.join(&section.migrations_dir);
        let migrations: Vec<PathBuf> = if self.fs.is_dir(&migrations_dir) {
            walk_files(self.fs, &migrations_dir, &[])?
        } else {
            Vec::new()
        };
        if migrations.is_empty() {
            return Ok(GateOutcome::fail(
                SCHEMA_APPLIED,
                format!("no migrations under {}", section.migrations_dir),
            ));
        }

        let keywords: Vec<String> = section.keywords.iter().map(|k| k.to_lowercase()).collect();
        for path in migrations.iter() {
            let text = self
                .fs
                .read_to_string(path)
                .with_context(|| format!("reading migration {}", path.display()))?
                .to_lowercase();
            if keywords.iter().all(|k| text.contains(k.as_str())) {
                return Ok(GateOutcome::pass(
                    SCHEMA_APPLIED,
                    format!("migration {} applies schema", relative_display(self.root, path)),
                ));
            }
        }

        Ok(GateOutcome::fail(
            SCHEMA_APPLIED,
            format!("no migration mentions {}", section.keywords.join(", ")),
        ))
    }

    fn api_contract_exists(&self) -> Result<GateOutcome> {
        let section = &self.config.gates().api_contract_exists;
        let contract_path = self.root.join(&section.contract_file);
        if !self.fs.is_file(&contract_path) {
            return Ok(GateOutcome::fail(
                API_CONTRACT_EXISTS,
                format!("missing contract {}", section.contract_file),
            ));
        }

        let operation = section
            .operation_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        if let Some(op) = operation {
            let contract = self.fs.read_to_string(&contract_path)?;
            let declared = Regex::new(&format!(
                r#"(?m)operationId:\s*["']?{}["']?\s*$"#,
                regex::escape(op)
            ))?;
            if !declared.is_match(&contract) {
                return Ok(GateOutcome::fail(
                    API_CONTRACT_EXISTS,
                    format!("operationId {op} not declared in {}", section.contract_file),
                ));
            }
        }

        let handler_globs = build_globset(&section.handler_globs)?;
        let handlers: Vec<PathBuf> = walk_files(self.fs, self.root, &self.config.gates().skip_dirs)?
            .into_iter()
            .filter(|p| handler_globs.is_match(relative_display(self.root, p)))
            .collect();
        if handlers.is_empty() {
            return Ok(GateOutcome::fail(
                API_CONTRACT_EXISTS,
                format!("no handler file matches {}", section.handler_globs.join(", ")),
            ));
        }

        let Some(op) = operation else {
            let rel = relative_display(self.root, &handlers[0]);
            return Ok(GateOutcome::pass(API_CONTRACT_EXISTS, format!("handler {rel}")));
        };

        let snake = snake_case(op);
        for path in handlers.iter() {
            let text = self.fs.read_to_string(path)?;
            if text.contains(op) || text.contains(&snake) {
                let rel = relative_display(self.root, path);
                let detail = format!("handler {rel} implements {op}");
                return Ok(GateOutcome::pass(API_CONTRACT_EXISTS, detail));
            }
        }
        Ok(GateOutcome::fail(
            API_CONTRACT_EXISTS,
            format!("no handler implements {op}"),
        ))
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// `getUserProfile` → `get_user_profile`.
pub fn snake_case(ident: &str) -> String {
    CAMEL_BOUNDARY
        .replace_all(ident, "${1}_${2}")
        .replace('-', "_")
        .to_lowercase()
}
