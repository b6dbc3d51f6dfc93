//! Step inputs and their validation
//!
//! The build host hands the step a flat set of string inputs
//! (`repository_url`, `github_api_token`, ...). [`StepInputs`] is that raw
//! surface; [`StepConfig`] is the parsed, typed value the pipeline works on.

use crate::error::ConfigError;
use crate::secrets::Secret;

/// Review platform a set of credentials belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// github.com or GitHub Enterprise
    GitHub,
    /// gitlab.com or a self-hosted GitLab
    GitLab,
}

impl Provider {
    /// Display name used in messages
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::GitHub => "GitHub",
            Provider::GitLab => "GitLab",
        }
    }

    /// Prefix of the provider's input names
    pub fn input_prefix(&self) -> &'static str {
        match self {
            Provider::GitHub => "github",
            Provider::GitLab => "gitlab",
        }
    }
}

/// Raw step inputs as provided by the host
///
/// `Debug` redacts the tokens.
#[derive(Clone, Default)]
pub struct StepInputs {
    pub repository_url: String,
    pub additional_options: String,
    pub github_api_token: String,
    pub github_host: String,
    pub github_api_base_url: String,
    pub gitlab_api_token: String,
    pub gitlab_host: String,
    pub gitlab_api_base_url: String,
}

impl std::fmt::Debug for StepInputs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepInputs")
            .field("repository_url", &self.repository_url)
            .field("additional_options", &self.additional_options)
            .field("github_api_token", &Secret::new(self.github_api_token.as_str()))
            .field("github_host", &self.github_host)
            .field("github_api_base_url", &self.github_api_base_url)
            .field("gitlab_api_token", &Secret::new(self.gitlab_api_token.as_str()))
            .field("gitlab_host", &self.gitlab_host)
            .field("gitlab_api_base_url", &self.gitlab_api_base_url)
            .finish()
    }
}

/// Credentials and enterprise endpoints for one provider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    /// API token
    pub api_token: Secret,
    /// Enterprise host, empty for the public instance
    pub host: String,
    /// Enterprise API base URL, empty for the public instance
    pub api_base_url: String,
}

impl ProviderConfig {
    fn new(api_token: &str, host: &str, api_base_url: &str) -> Self {
        Self {
            api_token: Secret::new(api_token),
            host: host.trim().to_string(),
            api_base_url: api_base_url.trim().to_string(),
        }
    }

    /// Whether host and API base URL are both set
    pub fn is_enterprise(&self) -> bool {
        !self.host.is_empty() && !self.api_base_url.is_empty()
    }

    /// Exactly one of host / API base URL is set
    fn is_partial_enterprise(&self) -> bool {
        self.host.is_empty() != self.api_base_url.is_empty()
    }
}

/// Parsed step configuration
///
/// Built once from [`StepInputs`] and read-only afterwards; the only
/// rewrite is the repository URL normalization, which yields a new value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepConfig {
    /// Repository URL exported as `GIT_REPOSITORY_URL`
    pub repository_url: String,
    /// Extra arguments appended to `danger`
    pub additional_options: Vec<String>,
    /// GitHub credentials
    pub github: ProviderConfig,
    /// GitLab credentials
    pub gitlab: ProviderConfig,
}

impl StepConfig {
    /// Parse raw inputs, shell-splitting `additional_options`
    pub fn parse(inputs: &StepInputs) -> Result<Self, ConfigError> {
        let additional_options = shell_words::split(&inputs.additional_options).map_err(|e| {
            ConfigError::InvalidAdditionalOptions {
                options: inputs.additional_options.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            repository_url: inputs.repository_url.trim().to_string(),
            additional_options,
            github: ProviderConfig::new(
                &inputs.github_api_token,
                &inputs.github_host,
                &inputs.github_api_base_url,
            ),
            gitlab: ProviderConfig::new(
                &inputs.gitlab_api_token,
                &inputs.gitlab_host,
                &inputs.gitlab_api_base_url,
            ),
        })
    }

    /// Replace the repository URL
    pub fn with_repository_url(mut self, repository_url: impl Into<String>) -> Self {
        self.repository_url = repository_url.into();
        self
    }

    /// Credentials for the given provider
    pub fn provider(&self, provider: Provider) -> &ProviderConfig {
        match provider {
            Provider::GitHub => &self.github,
            Provider::GitLab => &self.gitlab,
        }
    }

    /// Check cross-field consistency
    ///
    /// At least one provider token must be set, and each provider's
    /// enterprise host and API base URL must be set together or not at all.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repository_url.is_empty() {
            return Err(ConfigError::MissingRepositoryUrl);
        }

        if self.github.api_token.is_empty() && self.gitlab.api_token.is_empty() {
            return Err(ConfigError::MissingCredentials);
        }

        for provider in [Provider::GitHub, Provider::GitLab] {
            if self.provider(provider).is_partial_enterprise() {
                return Err(ConfigError::IncompleteEnterpriseConfig {
                    provider: provider.display_name(),
                    prefix: provider.input_prefix(),
                });
            }
        }

        Ok(())
    }

    /// Input name / value pairs for the configuration banner, secrets redacted
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        vec![
            ("repository_url", self.repository_url.clone()),
            (
                "additional_options",
                shell_words::join(&self.additional_options),
            ),
            ("github_api_token", self.github.api_token.to_string()),
            ("github_host", self.github.host.clone()),
            ("github_api_base_url", self.github.api_base_url.clone()),
            ("gitlab_api_token", self.gitlab.api_token.to_string()),
            ("gitlab_host", self.gitlab.host.clone()),
            ("gitlab_api_base_url", self.gitlab.api_base_url.clone()),
        ]
    }
}
