//! danger-step core - bootstrap and run Danger in a build pipeline
//!
//! This crate validates the step inputs, normalizes the repository URL for
//! older Danger releases, makes sure Bundler is installed at the version the
//! lock file pins, and runs `bundle install` and `bundle exec danger` with
//! the provider settings exported to the child environment.

pub mod bundler;
pub mod config;
pub mod env;
pub mod error;
pub mod inputs;
pub mod normalize;
pub mod pipeline;
pub mod process;
pub mod secrets;
pub mod version;

#[cfg(test)]
mod testing;

pub use bundler::{DependencyResolver, DependencySpec, InstallOutcome, RubyManager};
pub use config::Config;
pub use env::EnvironmentMap;
pub use error::{CommandError, ConfigError, EnvError, Error, InstallError, Result};
pub use inputs::{Provider, ProviderConfig, StepConfig, StepInputs};
pub use normalize::{normalize_repository_url, should_trim_scheme, trim_scheme};
pub use pipeline::{Pipeline, PipelineError, PipelineState, Stage};
pub use process::{CommandExecutor, CommandLine, CommandOutput, OutputMode, SystemExecutor};
pub use secrets::Secret;
pub use version::Version;
