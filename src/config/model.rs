// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::{GateName, NodeKind, OnGateError};

/// Name of the optional project config file, looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "storydag.toml";

/// Top-level configuration as read from `storydag.toml`.
///
/// ```toml
/// [paths]
/// graph_dir = "docs/dag/stories"
/// db = ".backlog/tasks.db"
///
/// [status]
/// done = ["done", "completed"]
///
/// [gates]
/// on_error = "fail-open"
/// command_timeout_secs = 10
///
/// [gates.scope]
/// clean_tree = ["API", "UI"]
///
/// [gates.schema_applied]
/// schema_file = "db/schema.sql"
/// migrations_dir = "db/migrations"
/// keywords = ["create table", "stories"]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub paths: PathsSection,

    #[serde(default)]
    pub status: StatusSection,

    #[serde(default)]
    pub gates: GatesSection,
}

/// `[paths]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    /// Directory (relative to the project root) holding `<slug>.yaml` graphs.
    #[serde(default = "default_graph_dir")]
    pub graph_dir: String,

    /// Default task store path used when `--db` is not given.
    #[serde(default)]
    pub db: Option<String>,
}

fn default_graph_dir() -> String {
    "docs/dag/stories".to_string()
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            graph_dir: default_graph_dir(),
            db: None,
        }
    }
}

/// `[status]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusSection {
    /// Closed set of status literals that count as "done".
    #[serde(default = "default_done")]
    pub done: Vec<String>,
}

fn default_done() -> Vec<String> {
    ["done", "completed", "complete", "closed"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for StatusSection {
    fn default() -> Self {
        Self {
            done: default_done(),
        }
    }
}

/// `[gates]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct GatesSection {
    #[serde(default)]
    pub on_error: OnGateError,

    /// Upper bound for every gate subprocess.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Directory names skipped by tree scans (`no_rej`, handler lookup).
    #[serde(default = "default_skip_dirs")]
    pub skip_dirs: Vec<String>,

    /// Per-gate override of the node kinds a gate applies to.
    #[serde(default)]
    pub scope: BTreeMap<GateName, Vec<String>>,

    #[serde(default)]
    pub schema_applied: SchemaGateSection,

    #[serde(default)]
    pub api_contract_exists: ApiContractGateSection,
}

fn default_command_timeout_secs() -> u64 {
    10
}

fn default_skip_dirs() -> Vec<String> {
    [".git", "target", "node_modules"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for GatesSection {
    fn default() -> Self {
        Self {
            on_error: OnGateError::default(),
            command_timeout_secs: default_command_timeout_secs(),
            skip_dirs: default_skip_dirs(),
            scope: BTreeMap::new(),
            schema_applied: SchemaGateSection::default(),
            api_contract_exists: ApiContractGateSection::default(),
        }
    }
}

/// `[gates.schema_applied]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaGateSection {
    #[serde(default = "default_schema_file")]
    pub schema_file: String,

    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: String,

    /// Every keyword must appear (case-insensitively) in one migration.
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,

    /// Guard script consulted first when it exists.
    #[serde(default = "default_guard_script")]
    pub guard_script: Option<String>,
}

fn default_schema_file() -> String {
    "db/schema.sql".to_string()
}

fn default_migrations_dir() -> String {
    "db/migrations".to_string()
}

fn default_keywords() -> Vec<String> {
    vec!["create table".to_string()]
}

fn default_guard_script() -> Option<String> {
    Some("scripts/guards/schema_applied.sh".to_string())
}

impl Default for SchemaGateSection {
    fn default() -> Self {
        Self {
            schema_file: default_schema_file(),
            migrations_dir: default_migrations_dir(),
            keywords: default_keywords(),
            guard_script: default_guard_script(),
        }
    }
}

/// `[gates.api_contract_exists]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiContractGateSection {
    #[serde(default = "default_contract_file")]
    pub contract_file: String,

    /// Operation that must be declared in the contract and implemented by a
    /// handler. When unset only file presence is checked.
    #[serde(default)]
    pub operation_id: Option<String>,

    #[serde(default = "default_handler_globs")]
    pub handler_globs: Vec<String>,
}

fn default_contract_file() -> String {
    "api/openapi.yaml".to_string()
}

fn default_handler_globs() -> Vec<String> {
    ["src/**/*handler*", "src/**/*routes*", "src/**/api/**"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for ApiContractGateSection {
    fn default() -> Self {
        Self {
            contract_file: default_contract_file(),
            operation_id: None,
            handler_globs: default_handler_globs(),
        }
    }
}

/// Validated configuration.
///
/// Built from [`RawConfigFile`] via `TryFrom` (see `config::validate`); scope
/// overrides are already parsed into [`NodeKind`]s and the done set is
/// lower-cased.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    paths: PathsSection,
    done: Vec<String>,
    gates: GatesSection,
    scope_overrides: BTreeMap<GateName, Vec<NodeKind>>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        raw: RawConfigFile,
        scope_overrides: BTreeMap<GateName, Vec<NodeKind>>,
    ) -> Self {
        let done = raw
            .status
            .done
            .iter()
            .map(|s| s.trim().to_lowercase())
            .collect();
        Self {
            paths: raw.paths,
            done,
            gates: raw.gates,
            scope_overrides,
        }
    }

    pub fn paths(&self) -> &PathsSection {
        &self.paths
    }

    /// Lower-cased done literals.
    pub fn done_statuses(&self) -> &[String] {
        &self.done
    }

    pub fn gates(&self) -> &GatesSection {
        &self.gates
    }

    pub fn scope_overrides(&self) -> &BTreeMap<GateName, Vec<NodeKind>> {
        &self.scope_overrides
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(RawConfigFile::default(), BTreeMap::new())
    }
}
