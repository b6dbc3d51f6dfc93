//! Repository URL normalization for older Danger releases
//!
//! Danger before 8.0.5 expects `GIT_REPOSITORY_URL` without a scheme. The
//! installed version is probed with `danger --version`; a failed probe or an
//! unparsable version leaves the URL untouched.

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::process::{CommandExecutor, CommandLine, OutputMode};
use crate::version::Version;

/// First Danger release that accepts a URL with a scheme
pub const SCHEME_SUPPORTED_SINCE: Version = Version::new(8, 0, 5);

/// Characters stripped from the front of the URL for older Danger releases
const SCHEME_CHARS: &str = "https://";

/// Whether a Danger version string calls for stripping the URL scheme
///
/// True iff the version parses and sorts before 8.0.5. A pre-release never
/// matches, the same as a `<8.0.5` range constraint.
pub fn should_trim_scheme(raw_version: &str) -> bool {
    match raw_version.parse::<Version>() {
        Ok(version) => !version.is_prerelease() && version < SCHEME_SUPPORTED_SINCE,
        Err(e) => {
            warn!("Could not parse danger version: {}", e);
            false
        }
    }
}

/// Strip leading characters drawn from the set `{h, t, p, s, :, /}`
///
/// This is a character-class trim, not a scheme parser: `"ssh://host"` and
/// `"https://phab.example"` both lose more than a scheme. Older Danger
/// configurations depend on exactly this output.
pub fn trim_scheme(url: &str) -> &str {
    url.trim_start_matches(|c: char| SCHEME_CHARS.contains(c))
}

/// Run `<review_tool> --version` and return its trimmed output
pub async fn probe_version(executor: &dyn CommandExecutor, review_tool: &str) -> Result<String> {
    let cmd = CommandLine::new(review_tool).arg("--version");
    let output = executor
        .run(&cmd, OutputMode::Captured)
        .await
        .map_err(|e| Error::VersionProbe(e.detail()))?;
    Ok(output.output)
}

/// Return the URL to export, trimmed when the installed Danger needs it
pub async fn normalize_repository_url(
    executor: &dyn CommandExecutor,
    review_tool: &str,
    url: &str,
) -> String {
    let raw_version = match probe_version(executor, review_tool).await {
        Ok(version) => version,
        Err(e) => {
            warn!("{}", e);
            return url.to_string();
        }
    };

    info!("Found danger version: {}", raw_version);

    if should_trim_scheme(&raw_version) {
        let trimmed = trim_scheme(url);
        info!(from = %url, to = %trimmed, "Trimming repository URL scheme for danger < {}", SCHEME_SUPPORTED_SINCE);
        return trimmed.to_string();
    }

    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeExecutor;

    #[test]
    fn test_should_trim_scheme() {
        let scenarios = [
            ("8", true),
            ("8.0", true),
            ("8.0.0", true),
            ("8.0.4", true),
            ("8.0.5", false),
            ("8.0.6", false),
            ("8.1.0", false),
            ("9", false),
        ];

        for (input, expected) in scenarios {
            assert_eq!(should_trim_scheme(input), expected, "version {:?}", input);
        }
    }

    #[test]
    fn test_unparsable_version_does_not_trim() {
        assert!(!should_trim_scheme(""));
        assert!(!should_trim_scheme("danger: command not found"));
        assert!(!should_trim_scheme("8.0.x"));
    }

    #[test]
    fn test_prerelease_does_not_trim() {
        assert!(!should_trim_scheme("8.0.4-beta.1"));
    }

    #[test]
    fn test_trim_scheme_is_character_class() {
        assert_eq!(trim_scheme("https://github.com/org/repo"), "github.com/org/repo");
        assert_eq!(trim_scheme("http://gitlab.local/org/repo"), "gitlab.local/org/repo");
        assert_eq!(trim_scheme("github.com/org/repo"), "github.com/org/repo");
        // Leading characters from the set are removed even without a scheme
        assert_eq!(trim_scheme("https://phab.example/repo"), "ab.example/repo");
        assert_eq!(trim_scheme("ssh://git@host/repo"), "git@host/repo");
    }

    #[tokio::test]
    async fn test_normalize_trims_for_old_danger() {
        let executor = FakeExecutor::new().respond("danger --version", Ok("8.0.4"));
        let url = normalize_repository_url(&executor, "danger", "https://github.com/org/repo").await;
        assert_eq!(url, "github.com/org/repo");
        assert_eq!(executor.calls(), vec!["danger --version"]);
    }

    #[tokio::test]
    async fn test_normalize_keeps_url_for_new_danger() {
        let executor = FakeExecutor::new().respond("danger --version", Ok("9.4.3"));
        let url = normalize_repository_url(&executor, "danger", "https://github.com/org/repo").await;
        assert_eq!(url, "https://github.com/org/repo");
    }

    #[tokio::test]
    async fn test_normalize_fails_open_when_probe_fails() {
        let executor = FakeExecutor::new().respond("danger --version", Err(127));
        let url = normalize_repository_url(&executor, "danger", "https://github.com/org/repo").await;
        assert_eq!(url, "https://github.com/org/repo");
    }

    #[tokio::test]
    async fn test_normalize_fails_open_when_binary_missing() {
        let executor = FakeExecutor::new();
        let url = normalize_repository_url(&executor, "danger", "https://github.com/org/repo").await;
        assert_eq!(url, "https://github.com/org/repo");
    }
}
