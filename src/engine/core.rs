// src/engine/core.rs

//! Per-story scheduling pass.
//!
//! All gate evaluations finish before any task row is written, so one pass
//! applies a single gate snapshot to every task of the story.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::dag::{DoneSet, SchedulePlan, Scheduler};
use crate::engine::ProjectContext;
use crate::engine::summary::StorySummary;
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::gates::{CommandRunner, GateEvaluator, GateResults, GateScopes};
use crate::graph::load_graph;
use crate::store::{StoryRecord, TaskStore};

/// What one story's pass produced.
#[derive(Debug, Clone)]
pub struct StoryRun {
    pub plan: SchedulePlan,
    pub gates: GateResults,
    pub summary: StorySummary,
    /// Status rows written (0 on a dry run).
    pub written: usize,
    /// Rows moved by resequencing (0 on a dry run).
    pub moved: usize,
}

/// Runs the graph → gates → plan → write-back → resequence pipeline for a
/// single story.
#[derive(Debug)]
pub struct StoryPipeline<'a> {
    ctx: &'a ProjectContext,
    fs: &'a dyn FileSystem,
    runner: &'a dyn CommandRunner,
    done: DoneSet,
    scopes: GateScopes,
    dry_run: bool,
}

impl<'a> StoryPipeline<'a> {
    pub fn new(
        ctx: &'a ProjectContext,
        fs: &'a dyn FileSystem,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            ctx,
            fs,
            runner,
            done: ctx.done_set(),
            scopes: ctx.gate_scopes(),
            dry_run: false,
        }
    }

    /// Compute and report, but write nothing.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn run(
        &self,
        store: &mut TaskStore,
        story: &StoryRecord,
        now: DateTime<Utc>,
    ) -> Result<StoryRun> {
        let slug = story.slug.as_str();
        let spec = load_graph(self.fs, &self.ctx.graph_dir(), slug);

        let gates = match spec.as_ref() {
            Some(spec) if !spec.ready_requires.is_empty() => {
                GateEvaluator::new(self.fs, self.runner, &self.ctx.config, &self.ctx.root)
                    .evaluate(&spec.ready_requires)
                    .await
            }
            _ => GateResults::new(),
        };

        let tasks = if self.dry_run {
            store.peek_tasks_for_story(slug)?
        } else {
            store.tasks_for_story(slug)?
        };
        debug!(story = %slug, tasks = tasks.len(), graph = spec.is_some(), "loaded story");

        let plan =
            Scheduler::new(spec.as_ref(), &self.done, &self.scopes).plan(&tasks, &gates, now);

        let (written, moved) = if self.dry_run {
            info!(
                story = %slug,
                updates = plan.updates.len(),
                reorder = plan.needs_resequence(),
                "dry run; nothing written"
            );
            (0, 0)
        } else {
            for update in plan.updates.iter() {
                store.apply_update(update, now)?;
            }
            let moved = store.resequence(slug, &plan.order, now)?;
            (plan.updates.len(), moved)
        };

        let summary = StorySummary::from_plan(story.clone(), &plan);
        info!(
            story = %slug,
            state = %summary.state,
            written,
            moved,
            "scheduled story"
        );

        Ok(StoryRun {
            plan,
            gates,
            summary,
            written,
            moved,
        })
    }
}
