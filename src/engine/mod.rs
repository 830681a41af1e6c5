// src/engine/mod.rs

//! Scheduling pipeline.
//!
//! - [`core`] runs one story: graph load, gate evaluation, planning,
//!   write-back and resequencing.
//! - [`runtime`] walks every selected story, isolating failures so one bad
//!   story cannot stop the rest.
//! - [`summary`] is the per-story TSV row.

pub mod core;
pub mod runtime;
pub mod summary;

use std::path::{Path, PathBuf};

use crate::config::{ConfigFile, load_for_project};
use crate::dag::DoneSet;
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::gates::GateScopes;

pub use self::core::{StoryPipeline, StoryRun};
pub use runtime::{RunReport, Runtime};
pub use summary::{StoryState, StorySummary};

/// Explicit ambient context threaded through every command.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    pub root: PathBuf,
    pub config: ConfigFile,
    /// Restrict commands to a single story slug (or legacy story id).
    pub story_filter: Option<String>,
}

impl ProjectContext {
    pub fn new(root: impl Into<PathBuf>, config: ConfigFile, story_filter: Option<String>) -> Self {
        Self {
            root: root.into(),
            config,
            story_filter,
        }
    }

    /// Load `storydag.toml` (or defaults) from `root`.
    pub fn load(fs: &dyn FileSystem, root: &Path, story_filter: Option<String>) -> Result<Self> {
        let config = load_for_project(fs, root)?;
        Ok(Self::new(root, config, story_filter))
    }

    pub fn graph_dir(&self) -> PathBuf {
        self.root.join(&self.config.paths().graph_dir)
    }

    pub fn done_set(&self) -> DoneSet {
        DoneSet::new(self.config.done_statuses())
    }

    pub fn gate_scopes(&self) -> GateScopes {
        GateScopes::from_config(&self.config)
    }

    /// Store path from the CLI, else `[paths].db` relative to the root.
    pub fn resolve_db(&self, cli: Option<&Path>) -> Option<PathBuf> {
        match cli {
            Some(path) => Some(path.to_path_buf()),
            None => self.config.paths().db.as_deref().map(|db| self.root.join(db)),
        }
    }
}
