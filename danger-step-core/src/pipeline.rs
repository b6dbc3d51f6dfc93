//! The danger step pipeline
//!
//! Stages run strictly forward:
//!
//! `Start → ParseConfig → NormalizeUrl → ValidateConfig → PublishEnv →
//! ResolveDependency → InstallProjectDeps → RunReviewTool → Done`
//!
//! The first failing stage ends the run in the `Failed` state. URL
//! normalization never fails; it falls back to the unmodified URL.

use std::fmt;

use thiserror::Error;
use tracing::info;

use crate::bundler::{DependencyResolver, DependencySpec};
use crate::config::Config;
use crate::env::EnvironmentMap;
use crate::error::Error;
use crate::inputs::{StepConfig, StepInputs};
use crate::normalize::normalize_repository_url;
use crate::process::{CommandExecutor, CommandLine, OutputMode};

/// A pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    ParseConfig,
    NormalizeUrl,
    ValidateConfig,
    PublishEnv,
    ResolveDependency,
    InstallProjectDeps,
    RunReviewTool,
    Done,
}

impl Stage {
    /// The stage that follows this one
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::Start => Some(Stage::ParseConfig),
            Stage::ParseConfig => Some(Stage::NormalizeUrl),
            Stage::NormalizeUrl => Some(Stage::ValidateConfig),
            Stage::ValidateConfig => Some(Stage::PublishEnv),
            Stage::PublishEnv => Some(Stage::ResolveDependency),
            Stage::ResolveDependency => Some(Stage::InstallProjectDeps),
            Stage::InstallProjectDeps => Some(Stage::RunReviewTool),
            Stage::RunReviewTool => Some(Stage::Done),
            Stage::Done => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::ParseConfig => "parse config",
            Stage::NormalizeUrl => "normalize repository URL",
            Stage::ValidateConfig => "validate config",
            Stage::PublishEnv => "publish environment",
            Stage::ResolveDependency => "resolve bundler",
            Stage::InstallProjectDeps => "install project dependencies",
            Stage::RunReviewTool => "run danger",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a pipeline run stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// At a stage (or `Done`)
    Active(Stage),
    /// Stopped at the stage that failed
    Failed(Stage),
}

/// A pipeline run that stopped at `stage`
#[derive(Error, Debug)]
#[error("{stage} failed")]
pub struct PipelineError {
    /// Stage that failed
    pub stage: Stage,
    /// What went wrong
    #[source]
    pub source: Error,
}

/// Orchestrates one danger run
pub struct Pipeline<'a> {
    executor: &'a dyn CommandExecutor,
    config: Config,
    state: PipelineState,
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline that runs commands through `executor`
    pub fn new(executor: &'a dyn CommandExecutor, config: Config) -> Self {
        Self {
            executor,
            config,
            state: PipelineState::Active(Stage::Start),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn advance(&mut self, to: Stage) {
        if let PipelineState::Active(from) = self.state {
            debug_assert_eq!(from.next(), Some(to), "pipeline stages only move forward");
            tracing::debug!(from = %from, to = %to, "Pipeline stage transition");
        }
        self.state = PipelineState::Active(to);
    }

    fn fail(&mut self, err: impl Into<Error>) -> PipelineError {
        let stage = match self.state {
            PipelineState::Active(stage) | PipelineState::Failed(stage) => stage,
        };
        self.state = PipelineState::Failed(stage);
        PipelineError {
            stage,
            source: err.into(),
        }
    }

    /// Run every stage in order, stopping at the first failure
    pub async fn run(&mut self, inputs: &StepInputs) -> Result<(), PipelineError> {
        self.advance(Stage::ParseConfig);
        let step = StepConfig::parse(inputs).map_err(|e| self.fail(e))?;

        self.advance(Stage::NormalizeUrl);
        let url =
            normalize_repository_url(self.executor, &self.config.tools.review_tool, &step.repository_url)
                .await;
        let step = step.with_repository_url(url);

        info!("Configs:");
        for (name, value) in step.summary() {
            info!("- {}: {}", name, value);
        }

        self.advance(Stage::ValidateConfig);
        step.validate().map_err(|e| self.fail(e))?;

        self.advance(Stage::PublishEnv);
        let env = EnvironmentMap::publish(&step).map_err(|e| self.fail(e))?;
        tracing::debug!(vars = ?env, "Published environment");

        self.advance(Stage::ResolveDependency);
        self.resolve_dependency(&env).await.map_err(|e| self.fail(e))?;

        self.advance(Stage::InstallProjectDeps);
        info!("Installing dependencies from your gem file");
        let install = CommandLine::new(&self.config.tools.package_manager)
            .arg("install")
            .with_env(&env);
        self.run_main_command(&install).await.map_err(|e| self.fail(e))?;

        self.advance(Stage::RunReviewTool);
        info!("Running {}", self.config.tools.review_tool);
        let review = CommandLine::new(&self.config.tools.package_manager)
            .args(["exec", self.config.tools.review_tool.as_str()])
            .args(step.additional_options.iter().cloned())
            .with_env(&env);
        self.run_main_command(&review).await.map_err(|e| self.fail(e))?;

        self.advance(Stage::Done);
        info!("Done");
        Ok(())
    }

    async fn resolve_dependency(&self, env: &EnvironmentMap) -> Result<(), Error> {
        let tools = &self.config.tools;
        info!("Checking dependencies");

        let spec = DependencySpec::from_lock_file(
            &self.config.lock_file_path(),
            &tools.package_manager_gem,
        )?;

        DependencyResolver::new(self.executor, tools.package_manager_gem.as_str())
            .with_gem_command(tools.gem_command.as_str())
            .with_env(env)
            .ensure_installed(&spec)
            .await?;
        Ok(())
    }

    async fn run_main_command(&self, cmd: &CommandLine) -> Result<(), Error> {
        self.executor
            .run(cmd, OutputMode::PassThrough)
            .await
            .map_err(|source| Error::Execution {
                step: cmd.printable(),
                source,
            })?;
        Ok(())
    }
}
