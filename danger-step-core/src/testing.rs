//! Recording command executor for unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::CommandError;
use crate::process::{CommandExecutor, CommandLine, CommandOutput, OutputMode};

/// Scripted response: captured output on success, exit code on failure
pub type Response = Result<&'static str, i32>;

/// Output a scripted failure produces unless given explicitly
pub const FAILURE_OUTPUT: &str = "scripted failure";

#[derive(Clone)]
enum Reply {
    Success(&'static str),
    Failure(i32, &'static str),
}

/// Executor that answers from a script and records every command it gets
///
/// Responses are queued per printable command line. The last queued
/// response repeats; a command with no script fails to spawn.
#[derive(Default)]
pub struct FakeExecutor {
    script: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<CommandLine>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for a command line
    pub fn respond(self, command: &str, response: Response) -> Self {
        let reply = match response {
            Ok(output) => Reply::Success(output),
            Err(code) => Reply::Failure(code, FAILURE_OUTPUT),
        };
        self.push(command, reply)
    }

    /// Queue a failure that printed `output` before exiting with `code`
    pub fn fail_with(self, command: &str, code: i32, output: &'static str) -> Self {
        self.push(command, Reply::Failure(code, output))
    }

    fn push(self, command: &str, reply: Reply) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry(command.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Printable command lines in execution order
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(CommandLine::printable)
            .collect()
    }

    /// Full recorded commands, including their environment overlay
    pub fn commands(&self) -> Vec<CommandLine> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded commands whose line starts with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl CommandExecutor for FakeExecutor {
    async fn run(
        &self,
        command: &CommandLine,
        mode: OutputMode,
    ) -> Result<CommandOutput, CommandError> {
        let printable = command.printable();
        self.calls.lock().unwrap().push(command.clone());

        let response = {
            let mut script = self.script.lock().unwrap();
            match script.get_mut(&printable) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        let keep_output = |output: &str| match mode {
            OutputMode::Captured | OutputMode::Tee => output.to_string(),
            OutputMode::PassThrough => String::new(),
        };

        match response {
            Some(Reply::Success(output)) => Ok(CommandOutput {
                exit_code: 0,
                output: keep_output(output),
            }),
            Some(Reply::Failure(code, output)) => Err(CommandError::NonZeroExit {
                command: printable,
                code: Some(code),
                output: keep_output(output),
            }),
            None => Err(CommandError::Spawn {
                command: printable,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
            }),
        }
    }
}
