// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod gates;
pub mod graph;
pub mod logging;
pub mod report;
pub mod store;
pub mod types;

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::cli::{CliArgs, Command, NextArgs, ScheduleArgs, ValidateArgs, WhyArgs};
use crate::engine::{ProjectContext, Runtime};
use crate::errors::{Result, StorydagError};
use crate::fs::RealFileSystem;
use crate::gates::TokioCommandRunner;
use crate::graph::validate_all;
use crate::report::{explain, list_ready};
use crate::store::TaskStore;

/// High-level entry point used by `main.rs`. Returns the process exit code.
pub async fn run(args: CliArgs) -> Result<i32> {
    match args.command {
        Command::Validate(a) => run_validate(a),
        Command::Next(a) => run_next(a),
        Command::Why(a) => run_why(a),
        Command::Schedule(a) => run_schedule(a).await,
    }
}

fn run_validate(args: ValidateArgs) -> Result<i32> {
    let fs = RealFileSystem;
    let ctx = ProjectContext::load(&fs, &args.project.project_root, args.story)?;
    let graph_dir = ctx.graph_dir();
    let reports = validate_all(&fs, &graph_dir, ctx.story_filter.as_deref())?;

    if reports.is_empty() {
        println!("no graph files under {}", graph_dir.display());
        return Ok(0);
    }

    let mut failed = 0;
    for report in reports.iter() {
        if report.ok() {
            println!("[ok] {}", report.slug);
        } else {
            failed += 1;
            println!("[fail] {}", report.slug);
            for err in report.errors.iter() {
                println!("  - {err}");
            }
        }
    }
    info!(stories = reports.len(), failed, "validation finished");
    Ok(if failed == 0 { 0 } else { 1 })
}

fn run_next(args: NextArgs) -> Result<i32> {
    let fs = RealFileSystem;
    let ctx = ProjectContext::load(&fs, &args.project.project_root, args.story)?;
    let Some(store) = open_existing_store(&ctx, args.db.as_deref())? else {
        return Ok(1);
    };

    let stories = list_ready(&store, &ctx.done_set(), ctx.story_filter.as_deref())?;
    if stories.is_empty() {
        println!("no stories");
    }
    for story in stories.iter() {
        print!("{story}");
    }
    Ok(0)
}

fn run_why(args: WhyArgs) -> Result<i32> {
    let fs = RealFileSystem;
    let ctx = ProjectContext::load(&fs, &args.project.project_root, None)?;
    let Some(store) = open_existing_store(&ctx, args.db.as_deref())? else {
        return Ok(1);
    };

    match explain(&store, &ctx.done_set(), &args.task) {
        Ok(explanation) => {
            print!("{explanation}");
            Ok(0)
        }
        Err(StorydagError::TaskNotFound(reference)) => {
            eprintln!("no task matches '{reference}'");
            Ok(1)
        }
        Err(err) => Err(err),
    }
}

async fn run_schedule(args: ScheduleArgs) -> Result<i32> {
    let fs = RealFileSystem;
    let ctx = ProjectContext::load(&fs, &args.project.project_root, args.story)?;
    let Some(mut store) = open_existing_store(&ctx, args.db.as_deref())? else {
        return Ok(1);
    };

    let timeout = Duration::from_secs(ctx.config.gates().command_timeout_secs);
    let runner = TokioCommandRunner::new(timeout);
    let runtime = Runtime::new(&ctx, &fs, &runner, args.dry_run);
    let report = runtime.run(&mut store).await?;

    for summary in report.summaries.iter() {
        println!("{}", summary.to_tsv());
    }
    debug!(stories = report.summaries.len(), failed = report.failed(), "schedule finished");
    Ok(if report.failed() == 0 { 0 } else { 1 })
}

/// Open the task store, printing a diagnostic and returning `None` when no
/// path is configured or the file does not exist.
fn open_existing_store(ctx: &ProjectContext, cli_db: Option<&Path>) -> Result<Option<TaskStore>> {
    let Some(path) = ctx.resolve_db(cli_db) else {
        eprintln!("no task store given (use --db or set [paths].db in storydag.toml)");
        return Ok(None);
    };
    if !path.is_file() {
        eprintln!("task store not found: {}", path.display());
        return Ok(None);
    }
    debug!(path = %path.display(), "opening task store");
    Ok(Some(TaskStore::open(&path)?))
}
