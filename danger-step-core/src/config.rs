//! Toolchain configuration for danger-step
//!
//! Step inputs (tokens, repository URL) come from the host environment and
//! live in [`crate::inputs`]. This module covers how the toolchain is driven:
//! which binaries to call, where the lock file lives, and how long a command
//! may run.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Config file (`--config` / `DANGER_STEP_CONFIG`)
//! 3. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Binaries and files the pipeline works with
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Review tool executable, probed with `--version` and run through `bundle exec`
    pub review_tool: String,

    /// Package manager command (`bundle install`, `bundle exec`)
    pub package_manager: String,

    /// Gem that provides the package manager
    pub package_manager_gem: String,

    /// Gem installer command
    pub gem_command: String,

    /// Lock file naming the pinned package manager version, relative to `workdir`
    pub lock_file: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            review_tool: "danger".to_string(),
            package_manager: "bundle".to_string(),
            package_manager_gem: "bundler".to_string(),
            gem_command: "gem".to_string(),
            lock_file: PathBuf::from("Gemfile.lock"),
        }
    }
}

/// Process execution settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecConfig {
    /// Working directory for every command
    pub workdir: Option<PathBuf>,

    /// Kill a command that runs longer than this (e.g. "15m")
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Toolchain binaries and files
    pub tools: ToolsConfig,

    /// Execution settings
    pub exec: ExecConfig,
}

impl Config {
    /// Load configuration from an optional file
    ///
    /// Returns default config when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Settings(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents)
            .map_err(|e| Error::Settings(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, workdir: Option<PathBuf>, timeout: Option<Duration>) -> Self {
        if let Some(dir) = workdir {
            self.exec.workdir = Some(dir);
        }

        if let Some(t) = timeout {
            self.exec.timeout = Some(t);
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > config file > defaults
    pub fn load_with_overrides(
        path: Option<&Path>,
        workdir: Option<PathBuf>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        Ok(Self::load(path)?.with_cli_overrides(workdir, timeout))
    }

    /// Working directory, defaulting to the current directory
    pub fn workdir(&self) -> PathBuf {
        self.exec
            .workdir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Lock file path resolved against the working directory
    pub fn lock_file_path(&self) -> PathBuf {
        if self.tools.lock_file.is_absolute() {
            self.tools.lock_file.clone()
        } else {
            self.workdir().join(&self.tools.lock_file)
        }
    }
}
