//! Environment overlay handed to child processes
//!
//! Danger reads its repository and provider settings from fixed environment
//! variables. Instead of mutating our own process environment, the pipeline
//! builds one [`EnvironmentMap`] and attaches it to every command it runs
//! after the publish stage.

use crate::error::EnvError;
use crate::inputs::StepConfig;

pub const GIT_REPOSITORY_URL: &str = "GIT_REPOSITORY_URL";
pub const DANGER_GITHUB_API_TOKEN: &str = "DANGER_GITHUB_API_TOKEN";
pub const DANGER_GITHUB_HOST: &str = "DANGER_GITHUB_HOST";
pub const DANGER_GITHUB_API_BASE_URL: &str = "DANGER_GITHUB_API_BASE_URL";
pub const DANGER_GITLAB_API_TOKEN: &str = "DANGER_GITLAB_API_TOKEN";
pub const DANGER_GITLAB_HOST: &str = "DANGER_GITLAB_HOST";
pub const DANGER_GITLAB_API_BASE_URL: &str = "DANGER_GITLAB_API_BASE_URL";

/// Ordered variable name / value pairs
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EnvironmentMap {
    vars: Vec<(String, String)>,
}

impl EnvironmentMap {
    /// Build the overlay from a validated configuration
    ///
    /// Empty values are skipped rather than exported as empty.
    pub fn publish(config: &StepConfig) -> Result<Self, EnvError> {
        Self::from_pairs([
            (GIT_REPOSITORY_URL, config.repository_url.as_str()),
            (DANGER_GITHUB_API_TOKEN, config.github.api_token.expose()),
            (DANGER_GITHUB_HOST, config.github.host.as_str()),
            (DANGER_GITHUB_API_BASE_URL, config.github.api_base_url.as_str()),
            (DANGER_GITLAB_API_TOKEN, config.gitlab.api_token.expose()),
            (DANGER_GITLAB_HOST, config.gitlab.host.as_str()),
            (DANGER_GITLAB_API_BASE_URL, config.gitlab.api_base_url.as_str()),
        ])
    }

    /// Build an overlay from arbitrary pairs, skipping empty values
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, EnvError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut vars = Vec::new();
        for (key, value) in pairs {
            if value.is_empty() {
                continue;
            }
            check_representable(key, value)?;
            vars.push((key.to_string(), value.to_string()));
        }
        Ok(Self { vars })
    }

    /// Value of a variable, if exported
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Exported variable names in publish order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.vars.iter().map(|(k, _)| k.as_str())
    }

    /// Name / value pairs in publish order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl std::fmt::Debug for EnvironmentMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.keys()).finish()
    }
}

/// Reject pairs the platform cannot place in a child environment
fn check_representable(key: &str, value: &str) -> Result<(), EnvError> {
    let reason = if key.is_empty() {
        Some("variable name is empty")
    } else if key.contains('=') {
        Some("variable name contains '='")
    } else if key.contains('\0') {
        Some("variable name contains a NUL byte")
    } else if value.contains('\0') {
        Some("value contains a NUL byte")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(EnvError {
            key: key.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::StepInputs;

    fn parse(inputs: StepInputs) -> StepConfig {
        StepConfig::parse(&inputs).unwrap()
    }

    #[test]
    fn test_publish_skips_empty_values() {
        let config = parse(StepInputs {
            repository_url: "github.com/org/repo".to_string(),
            github_api_token: "ghp_token".to_string(),
            ..Default::default()
        });

        let env = EnvironmentMap::publish(&config).unwrap();
        assert_eq!(
            env.keys().collect::<Vec<_>>(),
            vec![GIT_REPOSITORY_URL, DANGER_GITHUB_API_TOKEN]
        );
        assert_eq!(env.get(GIT_REPOSITORY_URL), Some("github.com/org/repo"));
        assert_eq!(env.get(DANGER_GITHUB_API_TOKEN), Some("ghp_token"));
        for absent in [
            DANGER_GITHUB_HOST,
            DANGER_GITHUB_API_BASE_URL,
            DANGER_GITLAB_API_TOKEN,
            DANGER_GITLAB_HOST,
            DANGER_GITLAB_API_BASE_URL,
        ] {
            assert!(env.get(absent).is_none(), "{} should be absent", absent);
        }
    }

    #[test]
    fn test_publish_all_variables_in_order() {
        let config = parse(StepInputs {
            repository_url: "https://gitlab.example.com/org/repo".to_string(),
            github_api_token: "gh".to_string(),
            github_host: "github.example.com".to_string(),
            github_api_base_url: "https://github.example.com/api/v3".to_string(),
            gitlab_api_token: "gl".to_string(),
            gitlab_host: "gitlab.example.com".to_string(),
            gitlab_api_base_url: "https://gitlab.example.com/api/v4".to_string(),
            ..Default::default()
        });

        let env = EnvironmentMap::publish(&config).unwrap();
        assert_eq!(env.len(), 7);
        assert_eq!(
            env.keys().collect::<Vec<_>>(),
            vec![
                GIT_REPOSITORY_URL,
                DANGER_GITHUB_API_TOKEN,
                DANGER_GITHUB_HOST,
                DANGER_GITHUB_API_BASE_URL,
                DANGER_GITLAB_API_TOKEN,
                DANGER_GITLAB_HOST,
                DANGER_GITLAB_API_BASE_URL,
            ]
        );
        assert_eq!(env.get(DANGER_GITLAB_HOST), Some("gitlab.example.com"));
    }

    #[test]
    fn test_nul_byte_is_env_error() {
        let err = EnvironmentMap::from_pairs([(GIT_REPOSITORY_URL, "repo\0url")]).unwrap_err();
        assert_eq!(err.key, GIT_REPOSITORY_URL);
        assert!(err.to_string().contains("NUL"));
    }

    #[test]
    fn test_debug_lists_names_only() {
        let env = EnvironmentMap::from_pairs([(DANGER_GITLAB_API_TOKEN, "glpat-secret")]).unwrap();
        let debug = format!("{:?}", env);
        assert!(debug.contains(DANGER_GITLAB_API_TOKEN));
        assert!(!debug.contains("glpat-secret"));
    }
}
