#![allow(dead_code)]

use std::path::{Path, PathBuf};

use storydag::config::ConfigFile;
use storydag::dag::{DoneSet, SchedulePlan, Scheduler};
use storydag::engine::ProjectContext;
use storydag::fs::mock::MockFileSystem;
use storydag::gates::{GateResults, GateScopes};
use storydag::graph::GraphSpec;
use storydag::store::TaskRecord;

pub use storydag_test_utils::builders;
pub use storydag_test_utils::fake_runner;
pub use storydag_test_utils::init_tracing;

pub const ROOT: &str = "/proj";

pub fn root() -> PathBuf {
    PathBuf::from(ROOT)
}

/// Run the scheduler with default done literals and gate scopes.
pub fn plan(spec: Option<&GraphSpec>, tasks: &[TaskRecord], gates: &GateResults) -> SchedulePlan {
    let done = DoneSet::default();
    let scopes = GateScopes::default();
    Scheduler::new(spec, &done, &scopes).plan(tasks, gates, builders::fixed_now())
}

/// Mock project tree with one graph file per `(slug, yaml)` pair.
pub fn project_with_graphs(graphs: &[(&str, String)]) -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_dir(ROOT);
    for (slug, yaml) in graphs {
        fs.add_file(graph_file(slug), yaml.clone());
    }
    fs
}

pub fn graph_file(slug: &str) -> PathBuf {
    Path::new(ROOT).join("docs/dag/stories").join(format!("{slug}.yaml"))
}

pub fn default_context() -> ProjectContext {
    ProjectContext::new(ROOT, ConfigFile::default(), None)
}
