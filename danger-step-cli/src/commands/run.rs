//! Run command - bootstrap Bundler and run Danger

use std::fmt;

use clap::Args;
use danger_step_core::{Config, Pipeline, StepInputs, SystemExecutor};

/// Step inputs, read from the host environment or flags
#[derive(Args, Clone)]
pub struct InputArgs {
    /// Repository URL exported as GIT_REPOSITORY_URL
    #[arg(long, env = "repository_url", default_value = "")]
    pub repository_url: String,

    /// Extra options for danger, split like a shell would
    #[arg(long, env = "additional_options", default_value = "", allow_hyphen_values = true)]
    pub additional_options: String,

    /// GitHub API token
    #[arg(long, env = "github_api_token", default_value = "", hide_env_values = true, hide_default_value = true)]
    pub github_api_token: String,

    /// GitHub Enterprise host
    #[arg(long, env = "github_host", default_value = "")]
    pub github_host: String,

    /// GitHub Enterprise API base URL
    #[arg(long, env = "github_api_base_url", default_value = "")]
    pub github_api_base_url: String,

    /// GitLab API token
    #[arg(long, env = "gitlab_api_token", default_value = "", hide_env_values = true, hide_default_value = true)]
    pub gitlab_api_token: String,

    /// Self-hosted GitLab host
    #[arg(long, env = "gitlab_host", default_value = "")]
    pub gitlab_host: String,

    /// Self-hosted GitLab API base URL
    #[arg(long, env = "gitlab_api_base_url", default_value = "")]
    pub gitlab_api_base_url: String,
}

impl fmt::Debug for InputArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Same redaction as the core inputs
        fmt::Debug::fmt(&StepInputs::from(self.clone()), f)
    }
}

impl From<InputArgs> for StepInputs {
    fn from(args: InputArgs) -> Self {
        StepInputs {
            repository_url: args.repository_url,
            additional_options: args.additional_options,
            github_api_token: args.github_api_token,
            github_host: args.github_host,
            github_api_base_url: args.github_api_base_url,
            gitlab_api_token: args.gitlab_api_token,
            gitlab_host: args.gitlab_host,
            gitlab_api_base_url: args.gitlab_api_base_url,
        }
    }
}

/// Arguments for the run command
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub inputs: InputArgs,
}

impl RunArgs {
    /// Execute the pipeline
    pub async fn execute(self, config: Config) -> anyhow::Result<()> {
        let executor = SystemExecutor::new()
            .with_workdir(config.workdir())
            .with_timeout(config.exec.timeout);

        tracing::debug!(
            workdir = %config.workdir().display(),
            timeout = ?config.exec.timeout,
            "Starting danger step"
        );

        let inputs = StepInputs::from(self.inputs);
        let mut pipeline = Pipeline::new(&executor, config);
        pipeline.run(&inputs).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        inputs: InputArgs,
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let cli = TestCli::parse_from([
            "danger-step",
            "--repository-url",
            "https://github.com/org/repo",
            "--github-api-token",
            "ghp_secret",
            "--gitlab-api-token",
            "glpat-secret",
        ]);
        let debug = format!("{:?}", cli);
        assert!(debug.contains("https://github.com/org/repo"));
        assert!(!debug.contains("ghp_secret"));
        assert!(!debug.contains("glpat-secret"));
    }

    #[test]
    fn test_additional_options_accept_leading_hyphen() {
        let cli = TestCli::parse_from([
            "danger-step",
            "--additional-options",
            "--fail-on-errors=true",
        ]);
        let inputs = StepInputs::from(cli.inputs);
        assert_eq!(inputs.additional_options, "--fail-on-errors=true");
    }
}
