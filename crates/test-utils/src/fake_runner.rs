use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use storydag::gates::{CommandFuture, CommandOutput, CommandRunner, CommandSpec};

/// What the fake should do when a program is run.
#[derive(Debug, Clone)]
pub enum Scripted {
    Output(CommandOutput),
    /// Simulate a spawn failure or timeout.
    Error(String),
}

/// A fake command runner that:
/// - records every command it was asked to run
/// - answers from a script keyed by program name (`git`, `sh`, ...)
///
/// Unscripted programs exit successfully with empty output.
#[derive(Debug, Clone, Default)]
pub struct FakeCommandRunner {
    script: Arc<Mutex<BTreeMap<String, Scripted>>>,
    calls: Arc<Mutex<Vec<CommandSpec>>>,
}

impl FakeCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, program: &str, response: Scripted) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(program.to_string(), response);
        self
    }

    /// `program` exits 0 with `stdout`.
    pub fn succeeds(self, program: &str, stdout: &str) -> Self {
        self.on(
            program,
            Scripted::Output(CommandOutput {
                success: true,
                code: Some(0),
                stdout: stdout.to_string(),
                stderr: String::new(),
            }),
        )
    }

    /// `program` exits `code` with `stdout`/`stderr`.
    pub fn fails(self, program: &str, code: i32, stdout: &str, stderr: &str) -> Self {
        self.on(
            program,
            Scripted::Output(CommandOutput {
                success: false,
                code: Some(code),
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            }),
        )
    }

    pub fn errors(self, program: &str, message: &str) -> Self {
        self.on(program, Scripted::Error(message.to_string()))
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for FakeCommandRunner {
    fn run(&self, spec: CommandSpec) -> CommandFuture<'_> {
        let script = Arc::clone(&self.script);
        let calls = Arc::clone(&self.calls);

        Box::pin(async move {
            calls.lock().unwrap().push(spec.clone());
            let scripted = script.lock().unwrap().get(&spec.program).cloned();
            match scripted {
                Some(Scripted::Output(out)) => Ok(out),
                Some(Scripted::Error(msg)) => Err(anyhow!(msg)),
                None => Ok(CommandOutput {
                    success: true,
                    code: Some(0),
                    ..CommandOutput::default()
                }),
            }
        })
    }
}
