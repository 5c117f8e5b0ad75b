//! Deployment profiles and trigger kinds.
//!
//! A profile is the set of environment-specific constants (bot identity,
//! trigger phrase, naming) chosen once per run from the `DEPLOYMENT`
//! environment variable.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::model::ForgeKind;

/// Environment variable selecting the deployment.
pub const DEPLOYMENT_ENV: &str = "DEPLOYMENT";

/// Title prefix of the long-lived PRs validated through a comment trigger.
pub const COMMENT_TEST_PREFIX: &str = "Basic test case:";

/// Deployment of the service under test.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Deployment {
    #[default]
    Production,
    Staging,
}

impl Deployment {
    pub fn profile(&self) -> DeploymentProfile {
        match self {
            Deployment::Production => DeploymentProfile::production(),
            Deployment::Staging => DeploymentProfile::staging(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Deployment::Production => "production",
            Deployment::Staging => "staging",
        }
    }
}

/// The only way a deployment is chosen, from `--deployment` or
/// [`DEPLOYMENT_ENV`]. Unknown names are rejected rather than guessed.
impl std::str::FromStr for Deployment {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "production" | "prod" => Ok(Deployment::Production),
            "staging" | "stg" => Ok(Deployment::Staging),
            other => Err(ValidationError::Config(format!(
                "unknown deployment '{other}', expected production or staging"
            ))),
        }
    }
}

/// How the build is provoked.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Comment with the deployment's trigger phrase.
    Comment,
    /// New commit on the PR's source branch.
    Push,
    /// Freshly opened PR.
    PrOpened,
}

impl Trigger {
    pub fn name(&self) -> &'static str {
        match self {
            Trigger::Comment => "comment",
            Trigger::Push => "push",
            Trigger::PrOpened => "pr_opened",
        }
    }
}

/// Find/replace applied to the service config on freshly opened PRs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPatch {
    /// File the patch applies to.
    pub path: String,
    pub from: String,
    pub to: String,
    pub commit_message: String,
}

impl ConfigPatch {
    pub fn apply(&self, content: &str) -> String {
        content.replace(&self.from, &self.to)
    }
}

/// Who the deployment is on a given forge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgeIdentity {
    /// Owner of the statuses the deployment reports.
    pub status_owner: String,
    /// Login of the account that comments on PRs.
    pub comment_author: String,
}

/// Environment-specific constants for one validation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentProfile {
    pub deployment: Deployment,
    /// Comment that triggers a build.
    pub pr_comment: String,
    /// Owner of the build projects.
    pub build_owner: String,
    /// Title prefix of the PR validated through a push.
    pub push_trigger_prefix: String,
    /// Title prefix of the PRs validated through a comment.
    pub comment_trigger_prefix: String,
    /// Branch the opened-PR test case is created from.
    pub opened_pr_branch: String,
    pub opened_pr_title: String,
    pub github: ForgeIdentity,
    pub gitlab: ForgeIdentity,
    pub config_patch: Option<ConfigPatch>,
}

impl DeploymentProfile {
    pub fn production() -> Self {
        Self {
            deployment: Deployment::Production,
            pr_comment: "/packit build".to_string(),
            build_owner: "packit".to_string(),
            push_trigger_prefix: "Basic test case - push trigger".to_string(),
            comment_trigger_prefix: COMMENT_TEST_PREFIX.to_string(),
            opened_pr_branch: "test_case_opened_pr".to_string(),
            opened_pr_title: "Basic test case - opened PR trigger".to_string(),
            github: ForgeIdentity {
                status_owner: "Packit-as-a-Service".to_string(),
                comment_author: "packit-as-a-service[bot]".to_string(),
            },
            gitlab: ForgeIdentity {
                status_owner: "packit-as-a-service".to_string(),
                comment_author: "packit-as-a-service".to_string(),
            },
            config_patch: None,
        }
    }

    pub fn staging() -> Self {
        Self {
            deployment: Deployment::Staging,
            pr_comment: "/packit-stg build".to_string(),
            build_owner: "packit-stg".to_string(),
            push_trigger_prefix: "Basic test case (stg) - push trigger".to_string(),
            comment_trigger_prefix: COMMENT_TEST_PREFIX.to_string(),
            opened_pr_branch: "test_case_opened_pr".to_string(),
            opened_pr_title: "Basic test case - opened PR trigger".to_string(),
            github: ForgeIdentity {
                status_owner: "Packit-as-a-Service-stg".to_string(),
                comment_author: "packit-as-a-service-stg[bot]".to_string(),
            },
            gitlab: ForgeIdentity {
                status_owner: "packit-as-a-service-stg".to_string(),
                comment_author: "packit-as-a-service-stg".to_string(),
            },
            config_patch: Some(ConfigPatch {
                path: ".packit.yaml".to_string(),
                from: "---".to_string(),
                to: "---\npackit_instances: [\"stg\"]".to_string(),
                commit_message: "Build on staging".to_string(),
            }),
        }
    }

    pub fn identity(&self, kind: ForgeKind) -> &ForgeIdentity {
        match kind {
            ForgeKind::GitHub => &self.github,
            ForgeKind::GitLab => &self.gitlab,
        }
    }
}
