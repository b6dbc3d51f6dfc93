//! External command execution
//!
//! Every subprocess the pipeline launches goes through a [`CommandExecutor`].
//! The [`SystemExecutor`] logs the quoted command line, runs the process
//! with live output, captured output, or both, and classifies failures
//! into [`CommandError`] variants so callers can word their logs.

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::env::EnvironmentMap;
use crate::error::CommandError;

/// How a command's output is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Child stdout/stderr are connected to ours
    PassThrough,
    /// Output is buffered and returned trimmed
    Captured,
    /// Output is streamed to ours as it arrives and also buffered
    Tee,
}

/// A program with its arguments and environment overlay
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
    env: EnvironmentMap,
}

impl CommandLine {
    /// Create a command for the given program
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Append a single argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Attach an environment overlay, inherited on top of ours
    pub fn with_env(mut self, env: &EnvironmentMap) -> Self {
        self.env = env.clone();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn env(&self) -> &EnvironmentMap {
        &self.env
    }

    /// Shell-quoted command line, for logs
    ///
    /// The environment overlay is left out since it carries secrets.
    pub fn printable(&self) -> String {
        shell_words::join(std::iter::once(&self.program).chain(self.args.iter()))
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.printable())
    }
}

impl fmt::Debug for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandLine")
            .field("command", &self.printable())
            .field("env", &self.env.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Outcome of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code (0 unless the platform did not report one)
    pub exit_code: i32,
    /// Trimmed stdout followed by stderr; empty in pass-through mode
    pub output: String,
}

/// Seam between the pipeline and real processes
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run a command to completion
    ///
    /// Returns `Ok` only when the process exited successfully.
    async fn run(&self, command: &CommandLine, mode: OutputMode)
        -> Result<CommandOutput, CommandError>;
}

/// Executor that spawns real processes
#[derive(Debug, Clone, Default)]
pub struct SystemExecutor {
    workdir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl SystemExecutor {
    /// Create an executor running in the current directory without a deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every command in the given directory
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    /// Kill commands that run longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn build(&self, command: &CommandLine, mode: OutputMode) -> Command {
        let mut cmd = Command::new(command.program());
        cmd.args(command.get_args())
            .envs(command.env().iter())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        if let Some(ref dir) = self.workdir {
            cmd.current_dir(dir);
        }

        match mode {
            OutputMode::PassThrough => {
                cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
            OutputMode::Captured | OutputMode::Tee => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
        }

        cmd
    }

    async fn wait(
        &self,
        mut cmd: Command,
        printable: &str,
        mode: OutputMode,
    ) -> Result<(ExitStatus, String), CommandError> {
        let child = cmd.spawn().map_err(|source| CommandError::Spawn {
            command: printable.to_string(),
            source,
        })?;

        let finished = async move {
            match mode {
                OutputMode::PassThrough => {
                    let mut child = child;
                    child.wait().await.map(|status| (status, String::new()))
                }
                OutputMode::Captured => child
                    .wait_with_output()
                    .await
                    .map(|out| (out.status, combine_output(&out.stdout, &out.stderr))),
                OutputMode::Tee => {
                    let mut child = child;
                    let stdout = child.stdout.take();
                    let stderr = child.stderr.take();
                    let (out, err, status) = tokio::join!(
                        tee(stdout, std::io::stdout()),
                        tee(stderr, std::io::stderr()),
                        child.wait(),
                    );
                    match (out, err, status) {
                        (Ok(out), Ok(err), Ok(status)) => Ok((status, combine_output(&out, &err))),
                        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => Err(e),
                    }
                }
            }
        };

        let result = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, finished)
                .await
                .map_err(|_| CommandError::Timeout {
                    command: printable.to_string(),
                    timeout,
                })?,
            None => finished.await,
        };

        result.map_err(|source| CommandError::Wait {
            command: printable.to_string(),
            source,
        })
    }
}

#[async_trait]
impl CommandExecutor for SystemExecutor {
    async fn run(
        &self,
        command: &CommandLine,
        mode: OutputMode,
    ) -> Result<CommandOutput, CommandError> {
        let printable = command.printable();
        tracing::info!("$ {}", printable);

        let cmd = self.build(command, mode);
        let (status, output) = self.wait(cmd, &printable, mode).await?;

        if !status.success() {
            tracing::debug!(command = %printable, status = ?status.code(), "Command failed");
            return Err(CommandError::NonZeroExit {
                command: printable,
                code: status.code(),
                output,
            });
        }

        Ok(CommandOutput {
            exit_code: status.code().unwrap_or(0),
            output,
        })
    }
}

/// Copy a child stream into `sink` while keeping everything read
async fn tee<R, W>(reader: Option<R>, mut sink: W) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
    W: Write,
{
    let mut buffered = Vec::new();
    let Some(mut reader) = reader else {
        return Ok(buffered);
    };

    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        // A closed terminal must not fail the command
        let _ = sink.write_all(&chunk[..n]).and_then(|()| sink.flush());
        buffered.extend_from_slice(&chunk[..n]);
    }
    Ok(buffered)
}

/// Trimmed stdout and stderr joined by a newline
fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    let parts: Vec<&str> = [stdout.trim(), stderr.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printable_quotes_arguments() {
        let cmd = CommandLine::new("bundle")
            .args(["exec", "danger"])
            .arg("--dangerfile=ci/Danger File");
        assert_eq!(
            cmd.printable(),
            "bundle exec danger '--dangerfile=ci/Danger File'"
        );
    }

    #[test]
    fn test_debug_hides_env_values() {
        let env = EnvironmentMap::from_pairs([("DANGER_GITHUB_API_TOKEN", "ghp_secret")]).unwrap();
        let cmd = CommandLine::new("danger").with_env(&env);
        let debug = format!("{:?}", cmd);
        assert!(debug.contains("DANGER_GITHUB_API_TOKEN"));
        assert!(!debug.contains("ghp_secret"));
    }

    #[test]
    fn test_combine_output() {
        assert_eq!(combine_output(b" out \n", b""), "out");
        assert_eq!(combine_output(b"out\n", b"err\n"), "out\nerr");
        assert_eq!(combine_output(b"", b""), "");
    }

    #[tokio::test]
    async fn test_captured_output_is_trimmed() {
        let result = SystemExecutor::new()
            .run(&CommandLine::new("echo").arg("8.0.4"), OutputMode::Captured)
            .await
            .expect("echo failed");
        assert_eq!(result.output, "8.0.4");
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_pass_through_success() {
        let result = SystemExecutor::new()
            .run(&CommandLine::new("true"), OutputMode::PassThrough)
            .await
            .expect("true failed");
        assert!(result.output.is_empty());
    }

    #[tokio::test]
    async fn test_non_zero_exit_captures_output() {
        let cmd = CommandLine::new("sh").args(["-c", "echo broken >&2; exit 3"]);
        let err = SystemExecutor::new()
            .run(&cmd, OutputMode::Captured)
            .await
            .unwrap_err();
        match err {
            CommandError::NonZeroExit { code, output, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(output, "broken");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tee_keeps_output_of_failed_command() {
        let cmd = CommandLine::new("sh").args([
            "-c",
            "echo Fetching bundler; echo 'ERROR: permission denied' >&2; exit 1",
        ]);
        let err = SystemExecutor::new()
            .run(&cmd, OutputMode::Tee)
            .await
            .unwrap_err();
        match err {
            CommandError::NonZeroExit { code, output, .. } => {
                assert_eq!(code, Some(1));
                assert_eq!(output, "Fetching bundler\nERROR: permission denied");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tee_success_returns_output() {
        let result = SystemExecutor::new()
            .run(&CommandLine::new("echo").arg("installed"), OutputMode::Tee)
            .await
            .unwrap();
        assert_eq!(result.output, "installed");
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let err = SystemExecutor::new()
            .run(
                &CommandLine::new("/usr/bin/nonexistent-danger-binary"),
                OutputMode::Captured,
            )
            .await
            .unwrap_err();
        assert!(err.is_spawn());
        assert_eq!(err.command(), "/usr/bin/nonexistent-danger-binary");
    }

    #[tokio::test]
    async fn test_env_overlay_reaches_child() {
        let env = EnvironmentMap::from_pairs([("GIT_REPOSITORY_URL", "github.com/org/repo")]).unwrap();
        let cmd = CommandLine::new("sh")
            .args(["-c", "printf %s \"$GIT_REPOSITORY_URL\""])
            .with_env(&env);
        let result = SystemExecutor::new()
            .run(&cmd, OutputMode::Captured)
            .await
            .unwrap();
        assert_eq!(result.output, "github.com/org/repo");
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let err = SystemExecutor::new()
            .with_timeout(Some(Duration::from_millis(100)))
            .run(&CommandLine::new("sleep").arg("5"), OutputMode::Captured)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_workdir_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let result = SystemExecutor::new()
            .with_workdir(dir.path())
            .run(&CommandLine::new("pwd"), OutputMode::Captured)
            .await
            .unwrap();
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(
            std::path::Path::new(&result.output).canonicalize().unwrap(),
            expected
        );
    }
}
