// src/engine/runtime.rs

//! Multi-story driver for the `schedule` command.

use chrono::Utc;
use tracing::{error, info};

use crate::engine::ProjectContext;
use crate::engine::core::{StoryPipeline, StoryRun};
use crate::engine::summary::{StoryState, StorySummary};
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::gates::CommandRunner;
use crate::store::{StoryRecord, TaskStore};

/// Schedules every selected story in sequence order.
///
/// Stories are independent: a failure is logged, recorded as an `error`
/// summary, and the next story still runs.
#[derive(Debug)]
pub struct Runtime<'a> {
    ctx: &'a ProjectContext,
    pipeline: StoryPipeline<'a>,
}

/// Per-story results of one invocation.
#[derive(Debug, Default)]
pub struct RunReport {
    pub summaries: Vec<StorySummary>,
    pub runs: Vec<StoryRun>,
}

impl RunReport {
    pub fn failed(&self) -> usize {
        self.summaries
            .iter()
            .filter(|s| s.state == StoryState::Error)
            .count()
    }
}

impl<'a> Runtime<'a> {
    pub fn new(
        ctx: &'a ProjectContext,
        fs: &'a dyn FileSystem,
        runner: &'a dyn CommandRunner,
        dry_run: bool,
    ) -> Self {
        Self {
            ctx,
            pipeline: StoryPipeline::new(ctx, fs, runner).dry_run(dry_run),
        }
    }

    /// Stories selected by the context's filter, in sequence order.
    pub fn stories(&self, store: &TaskStore) -> Result<Vec<StoryRecord>> {
        match self.ctx.story_filter.as_deref() {
            Some(key) => Ok(vec![
                store.story(key)?.unwrap_or_else(|| StoryRecord::bare(key)),
            ]),
            None => store.stories(),
        }
    }

    pub async fn run(&self, store: &mut TaskStore) -> Result<RunReport> {
        let stories = self.stories(store)?;
        info!(stories = stories.len(), "scheduling stories");

        let mut report = RunReport::default();
        for story in stories {
            match self.pipeline.run(store, &story, Utc::now()).await {
                Ok(run) => {
                    report.summaries.push(run.summary.clone());
                    report.runs.push(run);
                }
                Err(err) => {
                    error!(story = %story.slug, error = %err, "story scheduling failed");
                    report.summaries.push(StorySummary::error(story));
                }
            }
        }
        Ok(report)
    }
}
