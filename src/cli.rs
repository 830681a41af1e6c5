// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `storydag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "storydag",
    version,
    about = "Schedule story tasks from their dependency graphs.",
    long_about = None
)]
pub struct CliArgs {
    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STORYDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Check graph files for format errors and cycles.
    Validate(ValidateArgs),
    /// List ready and blocked tasks per story.
    Next(NextArgs),
    /// Explain why a single task has its current status.
    Why(WhyArgs),
    /// Recompute blocked/ready status and task order for each story.
    Schedule(ScheduleArgs),
}

/// Options shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct ProjectArgs {
    /// Project root containing `storydag.toml` and the graph directory.
    #[arg(long, value_name = "PATH", default_value = ".")]
    pub project_root: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Validate only this story's graph.
    #[arg(long, value_name = "SLUG")]
    pub story: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct NextArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Report only this story.
    #[arg(long, value_name = "SLUG")]
    pub story: Option<String>,

    /// Path to the task store (SQLite). Defaults to `[paths].db`.
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct WhyArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Path to the task store (SQLite). Defaults to `[paths].db`.
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Task id, `story:positionN`, or a task id suffix.
    #[arg(long, value_name = "REF")]
    pub task: String,
}

#[derive(Debug, Clone, Args)]
pub struct ScheduleArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Schedule only this story.
    #[arg(long, value_name = "SLUG")]
    pub story: Option<String>,

    /// Path to the task store (SQLite). Defaults to `[paths].db`.
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Compute and print, but write nothing back.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
