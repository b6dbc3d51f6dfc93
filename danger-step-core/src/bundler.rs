//! Bundler bootstrap
//!
//! Makes sure the `bundler` gem is installed at the version pinned in
//! `Gemfile.lock` before `bundle install` runs. The check and the install go
//! through the `gem` CLI; nothing here touches the gem registry directly.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::env::EnvironmentMap;
use crate::error::InstallError;
use crate::process::{CommandExecutor, CommandLine, OutputMode};
use crate::version::Version;

/// Lock file section naming the Bundler version that wrote it
const BUNDLED_WITH: &str = "BUNDLED WITH";

/// Version constraint read from a lock file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySpec {
    /// Pinned version exactly as written in the lock file, `None` for any version
    pub version: Option<String>,
}

impl DependencySpec {
    /// Accept any installed version
    pub fn any() -> Self {
        Self::default()
    }

    /// Require an exact version
    pub fn pinned(version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
        }
    }

    /// Read the pinned version from a lock file
    ///
    /// A lock file that cannot be read is not an error: the check proceeds
    /// without a constraint. A `BUNDLED WITH` entry that is not a valid
    /// version is an error.
    pub fn from_lock_file(path: &Path, gem: &str) -> Result<Self, InstallError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Could not read from {}, error: {}", path.display(), e);
                info!("Using unspecified {} version", gem);
                return Ok(Self::any());
            }
        };

        Self::from_lock_contents(&contents).map_err(|reason| InstallError::LockFile {
            gem: gem.to_string(),
            path: path.display().to_string(),
            reason,
        })
    }

    /// Parse the `BUNDLED WITH` section of lock file contents
    pub fn from_lock_contents(contents: &str) -> Result<Self, String> {
        let Some(raw) = bundled_with(contents) else {
            return Ok(Self::any());
        };

        raw.parse::<Version>().map_err(|e| e.to_string())?;
        Ok(Self::pinned(raw))
    }
}

/// Version listed under `BUNDLED WITH`, if the section is present
fn bundled_with(contents: &str) -> Option<&str> {
    let mut lines = contents.lines();
    lines.by_ref().find(|line| line.trim() == BUNDLED_WITH)?;
    lines.map(str::trim).find(|line| !line.is_empty())
}

/// Whether `gem list` output contains the gem, optionally at an exact version
///
/// Lines look like `bundler (2.1.4, default: 1.17.2)`; platform suffixes
/// such as `1.10.9 x86_64-linux` are ignored.
pub fn gem_listed(gem_list: &str, gem: &str, version: Option<&str>) -> bool {
    gem_list.lines().any(|line| {
        let Some((name, rest)) = line.trim().split_once(" (") else {
            return false;
        };
        if name != gem {
            return false;
        }
        let Some(version) = version else {
            return true;
        };
        rest.trim_end_matches(')')
            .split(',')
            .filter_map(|entry| {
                let entry = entry.trim();
                let entry = entry.strip_prefix("default:").unwrap_or(entry);
                entry.split_whitespace().next()
            })
            .any(|listed| listed == version)
    })
}

/// Ruby version manager that needs its shims refreshed after a gem install
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RubyManager {
    /// Plain system or toolchain Ruby
    System,
    /// rbenv, refreshed with `rbenv rehash`
    Rbenv,
    /// asdf, refreshed with `asdf reshim ruby`
    Asdf,
}

impl RubyManager {
    /// Classify the path of the active `ruby` binary
    pub fn from_ruby_path(path: &str) -> Self {
        if path.contains("/.rbenv/") {
            RubyManager::Rbenv
        } else if path.contains("/.asdf/") {
            RubyManager::Asdf
        } else {
            RubyManager::System
        }
    }

    /// Command that refreshes executable shims, if any
    pub fn rehash_command(&self) -> Option<CommandLine> {
        match self {
            RubyManager::System => None,
            RubyManager::Rbenv => Some(CommandLine::new("rbenv").arg("rehash")),
            RubyManager::Asdf => Some(CommandLine::new("asdf").args(["reshim", "ruby"])),
        }
    }
}

/// Result of [`DependencyResolver::ensure_installed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The gem was present, nothing ran
    AlreadyInstalled,
    /// The install sequence ran and the gem is now present
    Installed,
}

/// Checks for a gem and installs it when missing
pub struct DependencyResolver<'a> {
    executor: &'a dyn CommandExecutor,
    gem_command: String,
    gem: String,
    env: EnvironmentMap,
}

impl<'a> DependencyResolver<'a> {
    /// Create a resolver for `gem`, driven through the `gem` CLI
    pub fn new(executor: &'a dyn CommandExecutor, gem: impl Into<String>) -> Self {
        Self {
            executor,
            gem_command: "gem".to_string(),
            gem: gem.into(),
            env: EnvironmentMap::default(),
        }
    }

    /// Use a different gem installer binary
    pub fn with_gem_command(mut self, gem_command: impl Into<String>) -> Self {
        self.gem_command = gem_command.into();
        self
    }

    /// Environment overlay for every command the resolver runs
    pub fn with_env(mut self, env: &EnvironmentMap) -> Self {
        self.env = env.clone();
        self
    }

    pub fn gem(&self) -> &str {
        &self.gem
    }

    /// Whether the gem is installed, at the pinned version if there is one
    pub async fn is_installed(&self, spec: &DependencySpec) -> Result<bool, InstallError> {
        let cmd = CommandLine::new(&self.gem_command)
            .arg("list")
            .with_env(&self.env);
        let listing = self
            .executor
            .run(&cmd, OutputMode::Captured)
            .await
            .map_err(|source| InstallError::Check {
                gem: self.gem.clone(),
                source,
            })?;
        Ok(gem_listed(
            &listing.output,
            &self.gem,
            spec.version.as_deref(),
        ))
    }

    /// Commands that install the gem, in order
    pub fn install_plan(&self, spec: &DependencySpec, manager: RubyManager) -> Vec<CommandLine> {
        let mut install = CommandLine::new(&self.gem_command).args(["install", self.gem.as_str(), "--force"]);
        if let Some(ref version) = spec.version {
            install = install.args(["--version", version.as_str()]);
        }

        let mut plan = vec![install];
        plan.extend(manager.rehash_command());
        plan.into_iter().map(|cmd| cmd.with_env(&self.env)).collect()
    }

    /// Detect a Ruby version manager from `which ruby`, falling back to system
    pub async fn detect_ruby_manager(&self) -> RubyManager {
        let cmd = CommandLine::new("which").arg("ruby").with_env(&self.env);
        match self.executor.run(&cmd, OutputMode::Captured).await {
            Ok(out) => RubyManager::from_ruby_path(&out.output),
            Err(e) => {
                debug!("Could not locate ruby, assuming no version manager: {}", e);
                RubyManager::System
            }
        }
    }

    /// Install the gem unless it is already present
    ///
    /// Runs the install plan step by step, aborting on the first failure,
    /// then checks once more that the gem is now listed. Step output is
    /// shown live and kept for the error of a failing step.
    pub async fn ensure_installed(&self, spec: &DependencySpec) -> Result<InstallOutcome, InstallError> {
        if self.is_installed(spec).await? {
            info!("{} installed", capitalize(&self.gem));
            return Ok(InstallOutcome::AlreadyInstalled);
        }

        warn!("{} is not installed", capitalize(&self.gem));
        info!("Installing {}", capitalize(&self.gem));

        let manager = self.detect_ruby_manager().await;
        for step in self.install_plan(spec, manager) {
            self.executor
                .run(&step, OutputMode::Tee)
                .await
                .map_err(InstallError::from_step)?;
        }

        if !self.is_installed(spec).await? {
            return Err(InstallError::StillMissing {
                gem: self.gem.clone(),
                version: spec.version.clone(),
            });
        }

        info!("{} installed", capitalize(&self.gem));
        Ok(InstallOutcome::Installed)
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
