//! Error types for danger-step

use std::time::Duration;

use thiserror::Error;

/// Result type alias for danger-step operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for danger-step operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Step inputs violate the configuration contract
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Toolchain settings file could not be loaded
    #[error("Settings error: {0}")]
    Settings(String),

    /// The review tool version could not be determined
    #[error("Could not determine danger version: {0}")]
    VersionProbe(String),

    /// The package manager could not be installed
    #[error(transparent)]
    Install(#[from] InstallError),

    /// The environment overlay could not be built
    #[error(transparent)]
    Env(#[from] EnvError),

    /// One of the main pipeline commands failed
    #[error("Failed to run {step}")]
    Execution {
        /// Human readable name of the step, e.g. `bundle install`
        step: String,
        #[source]
        source: CommandError,
    },
}

/// Violations of the step input contract
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `repository_url` is empty
    #[error("Required input repository_url is not set")]
    MissingRepositoryUrl,

    /// Neither provider token is set
    #[error(
        "None of the API tokens have been set. If you want to use GitHub you need to set \
         github_api_token. If you want to use GitLab you need to set gitlab_api_token"
    )]
    MissingCredentials,

    /// Only one of host / API base URL is set for a provider
    #[error(
        "If you want to use {provider} Enterprise you need to set both of the \
         {prefix}_host and the {prefix}_api_base_url"
    )]
    IncompleteEnterpriseConfig {
        /// Display name of the provider (GitHub, GitLab)
        provider: &'static str,
        /// Input name prefix of the provider (github, gitlab)
        prefix: &'static str,
    },

    /// `additional_options` could not be split into arguments
    #[error("Failed to shell-split additional options ({options}): {reason}")]
    InvalidAdditionalOptions {
        /// The raw option string
        options: String,
        /// Tokenizer error message
        reason: String,
    },
}

/// Failure of a single external command
#[derive(Error, Debug)]
pub enum CommandError {
    /// The process could not be started at all (missing binary, permissions)
    #[error("could not start `{command}`")]
    Spawn {
        /// Printable command line
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The process started but waiting on it or reading its output failed
    #[error("lost track of `{command}` while it was running")]
    Wait {
        /// Printable command line
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The process ran and reported failure
    #[error("`{command}` {}", describe_exit(.code))]
    NonZeroExit {
        /// Printable command line
        command: String,
        /// Exit code, `None` when terminated by a signal
        code: Option<i32>,
        /// Trimmed combined output, empty for pass-through commands
        output: String,
    },

    /// The process outlived its deadline and was killed
    #[error("`{command}` timed out after {}", format_secs(.timeout))]
    Timeout {
        /// Printable command line
        command: String,
        /// The deadline that expired
        timeout: Duration,
    },
}

impl CommandError {
    /// Printable command line of the failed command
    pub fn command(&self) -> &str {
        match self {
            CommandError::Spawn { command, .. }
            | CommandError::Wait { command, .. }
            | CommandError::NonZeroExit { command, .. }
            | CommandError::Timeout { command, .. } => command,
        }
    }

    /// Whether the process was started at all
    pub fn is_spawn(&self) -> bool {
        matches!(self, CommandError::Spawn { .. })
    }

    /// One-line description including the OS error or captured output
    pub fn detail(&self) -> String {
        match self {
            CommandError::Spawn { source, .. } | CommandError::Wait { source, .. } => {
                format!("{}: {}", self, source)
            }
            CommandError::NonZeroExit { output, .. } if !output.is_empty() => {
                format!("{}: {}", self, output)
            }
            _ => self.to_string(),
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with status {}", code),
        None => "was terminated by a signal".to_string(),
    }
}

fn format_secs(timeout: &Duration) -> String {
    format!("{}s", timeout.as_secs())
}

/// Failure to get the package manager installed
#[derive(Error, Debug)]
pub enum InstallError {
    /// The lock file names a version that is not a valid semantic version
    #[error("Could not determine required {gem} version from {path}: {reason}")]
    LockFile {
        /// Gem the lock file pins
        gem: String,
        /// Lock file path
        path: String,
        /// Parse failure
        reason: String,
    },

    /// Listing installed gems failed
    #[error("Failed to check {gem}")]
    Check {
        /// Gem being checked
        gem: String,
        #[source]
        source: CommandError,
    },

    /// An install step ran and exited non-zero
    #[error("Install step `{command}` failed{}", output_suffix(.output))]
    StepFailed {
        /// Printable command line of the step
        command: String,
        /// Captured output of the step
        output: String,
    },

    /// An install step could not be executed
    #[error("Install step could not be executed")]
    StepNotExecuted(#[source] CommandError),

    /// An install step started but did not run to completion
    #[error("Install step did not finish")]
    StepInterrupted(#[source] CommandError),

    /// The install sequence succeeded but the gem is still not listed
    #[error("{gem} {} is still not installed after running the install commands", version_label(.version))]
    StillMissing {
        /// Gem being installed
        gem: String,
        /// Pinned version, if any
        version: Option<String>,
    },
}

impl InstallError {
    /// Classify a failed install step
    pub fn from_step(err: CommandError) -> Self {
        match err {
            CommandError::NonZeroExit { command, output, .. } => {
                InstallError::StepFailed { command, output }
            }
            spawn @ CommandError::Spawn { .. } => InstallError::StepNotExecuted(spawn),
            other @ (CommandError::Timeout { .. } | CommandError::Wait { .. }) => {
                InstallError::StepInterrupted(other)
            }
        }
    }
}

fn version_label(version: &Option<String>) -> &str {
    version.as_deref().unwrap_or("(any version)")
}

fn output_suffix(output: &str) -> String {
    if output.is_empty() {
        String::new()
    } else {
        format!(", output:\n{}", output)
    }
}

/// A variable that cannot be handed to a child process
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to set env {key}: {reason}")]
pub struct EnvError {
    /// Variable name
    pub key: String,
    /// Why the value was rejected
    pub reason: String,
}
