//! Credentials and coordinates of the validated repositories.

use serde::{Deserialize, Serialize};

pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";
pub const DEFAULT_GITHUB_REPOSITORY: &str = "packit/hello-world";
pub const DEFAULT_GITLAB_URL: &str = "https://gitlab.com";
pub const DEFAULT_GITLAB_REPOSITORY: &str = "packit-service/hello-world";
pub const DEFAULT_COPR_URL: &str = "https://copr.fedorainfracloud.org";

/// Where to validate and with which tokens.
///
/// A forge without a token is skipped by the validation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgeSettings {
    pub github_token: Option<String>,
    pub github_api_url: String,
    pub github_repository: String,
    pub gitlab_token: Option<String>,
    pub gitlab_url: String,
    pub gitlab_repository: String,
    pub copr_url: String,
    /// Sentry DSN; failures are only logged without it.
    pub sentry_dsn: Option<String>,
}

impl Default for ForgeSettings {
    fn default() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }
}

impl ForgeSettings {
    /// Read `GITHUB_TOKEN`, `GITLAB_TOKEN`, `SENTRY_SECRET` and friends.
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        ForgeSettings {
            github_token: non_empty("GITHUB_TOKEN"),
            github_api_url: non_empty("GITHUB_API_URL")
                .unwrap_or_else(|| DEFAULT_GITHUB_API.to_string()),
            github_repository: non_empty("GITHUB_REPOSITORY")
                .unwrap_or_else(|| DEFAULT_GITHUB_REPOSITORY.to_string()),
            gitlab_token: non_empty("GITLAB_TOKEN"),
            gitlab_url: non_empty("GITLAB_URL").unwrap_or_else(|| DEFAULT_GITLAB_URL.to_string()),
            gitlab_repository: non_empty("GITLAB_REPOSITORY")
                .unwrap_or_else(|| DEFAULT_GITLAB_REPOSITORY.to_string()),
            copr_url: non_empty("COPR_URL").unwrap_or_else(|| DEFAULT_COPR_URL.to_string()),
            sentry_dsn: non_empty("SENTRY_SECRET"),
        }
    }
}

/// Split `namespace/name`; the namespace may contain further slashes
/// (GitLab subgroups).
pub fn split_repository(repository: &str) -> Option<(&str, &str)> {
    let (namespace, name) = repository.trim_matches('/').rsplit_once('/')?;
    if namespace.is_empty() || name.is_empty() {
        return None;
    }
    Some((namespace, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_without_env() {
        let settings = ForgeSettings::from_vars(|_| None);
        assert_eq!(settings.github_repository, "packit/hello-world");
        assert_eq!(settings.gitlab_repository, "packit-service/hello-world");
        assert!(settings.github_token.is_none());
        assert!(settings.sentry_dsn.is_none());
    }

    #[test]
    fn test_blank_token_counts_as_missing() {
        let vars: HashMap<&str, &str> =
            [("GITHUB_TOKEN", "  "), ("GITLAB_TOKEN", "glpat-123")].into();
        let settings = ForgeSettings::from_vars(|k| vars.get(k).map(|v| v.to_string()));
        assert!(settings.github_token.is_none());
        assert_eq!(settings.gitlab_token.as_deref(), Some("glpat-123"));
    }

    #[test]
    fn test_split_repository() {
        assert_eq!(
            split_repository("packit/hello-world"),
            Some(("packit", "hello-world"))
        );
        assert_eq!(
            split_repository("redhat/centos-stream/src/hello"),
            Some(("redhat/centos-stream/src", "hello"))
        );
        assert_eq!(split_repository("hello-world"), None);
        assert_eq!(split_repository("/hello"), None);
    }
}
