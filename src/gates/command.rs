// src/gates/command.rs

//! Subprocess seam for gates.
//!
//! Gates talk to a `CommandRunner` instead of spawning processes directly, so
//! tests can script `git status` and guard-script results without a real
//! repository.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tokio::process::Command;
use tracing::debug;

/// A command to run: program, arguments, working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl CommandSpec {
    pub fn new<I, S>(program: &str, args: I, cwd: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: cwd.into(),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in self.args.iter() {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Trimmed stdout followed by trimmed stderr.
    pub fn combined(&self) -> String {
        [self.stdout.trim(), self.stderr.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Boxed future returned by [`CommandRunner::run`].
pub type CommandFuture<'a> = Pin<Box<dyn Future<Output = Result<CommandOutput>> + Send + 'a>>;

/// Trait abstracting how gate subprocesses are run.
///
/// An `Err` means the command could not be run to completion (spawn failure,
/// timeout); a non-zero exit is a successful run with `success == false`.
pub trait CommandRunner: Send + Sync + fmt::Debug {
    fn run(&self, spec: CommandSpec) -> CommandFuture<'_>;
}

/// Production runner built on `tokio::process` with a hard timeout.
#[derive(Debug, Clone)]
pub struct TokioCommandRunner {
    timeout: Duration,
}

impl TokioCommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for TokioCommandRunner {
    fn run(&self, spec: CommandSpec) -> CommandFuture<'_> {
        let timeout = self.timeout;

        Box::pin(async move {
            debug!(cmd = %spec, cwd = ?spec.cwd, "running gate command");

            let mut cmd = Command::new(&spec.program);
            cmd.args(&spec.args)
                .current_dir(&spec.cwd)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            let child = cmd
                .spawn()
                .with_context(|| format!("spawning `{spec}`"))?;

            let output = tokio::time::timeout(timeout, child.wait_with_output())
                .await
                .map_err(|_| anyhow!("`{spec}` timed out after {}s", timeout.as_secs()))?
                .with_context(|| format!("waiting for `{spec}`"))?;

            Ok(CommandOutput {
                success: output.status.success(),
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        })
    }
}
