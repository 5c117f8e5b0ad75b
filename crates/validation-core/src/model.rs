//! Snapshots of external objects: pull requests, comments, statuses, builds.

use serde::{Deserialize, Serialize};

/// Source-hosting backend flavour.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ForgeKind {
    #[serde(rename = "github")]
    GitHub,
    #[serde(rename = "gitlab")]
    GitLab,
}

impl ForgeKind {
    /// Human-readable name used in failure messages.
    pub fn name(&self) -> &'static str {
        match self {
            ForgeKind::GitHub => "Github",
            ForgeKind::GitLab => "Gitlab",
        }
    }

    /// What the forge calls the per-commit indicators.
    pub fn status_noun(&self) -> &'static str {
        match self {
            ForgeKind::GitHub => "check runs",
            ForgeKind::GitLab => "commit statuses",
        }
    }

    /// Singular of [`status_noun`](Self::status_noun), capitalised.
    pub fn status_label(&self) -> &'static str {
        match self {
            ForgeKind::GitHub => "Check run",
            ForgeKind::GitLab => "Commit status",
        }
    }
}

impl std::fmt::Display for ForgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Pull request (merge request on GitLab).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// PR number (GitLab: MR iid).
    pub id: u64,
    pub title: String,
    /// Web URL.
    pub url: String,
    pub source_branch: String,
    pub target_branch: String,
    pub head_commit: String,
}

/// PR comment as seen by the validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub body: String,
}

/// Normalised state of a check run or commit status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusState {
    /// Accepted, not started (`queued`, `pending`, `created`).
    Queued,
    InProgress,
    Success,
    Failure,
    /// Terminal but neither success nor failure (`neutral`, `cancelled`, ...).
    OtherTerminal(String),
}

impl StatusState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StatusState::Success | StatusState::Failure | StatusState::OtherTerminal(_)
        )
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, StatusState::Queued)
    }
}

/// A named indicator attached to a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub name: String,
    /// App name (GitHub check runs) or author account (GitLab statuses).
    pub owner: String,
    pub state: StatusState,
    /// Short description / output title.
    pub message: String,
}

/// File contents on a branch, with the blob identifier needed for updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub path: String,
    pub content: String,
    pub sha: String,
}

/// States in which a build is still moving.
pub const NON_TERMINAL_BUILD_STATES: [&str; 6] = [
    "running",
    "pending",
    "starting",
    "forked",
    "importing",
    "waiting",
];

/// The only terminal state counted as success.
pub const BUILD_SUCCEEDED: &str = "succeeded";

/// Build-system job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub id: u64,
    pub state: String,
}

/// Classification of a raw build state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    InProgress,
    Succeeded,
    Failed,
}

impl BuildPhase {
    pub fn classify(state: &str) -> Self {
        if NON_TERMINAL_BUILD_STATES.contains(&state) {
            BuildPhase::InProgress
        } else if state == BUILD_SUCCEEDED {
            BuildPhase::Succeeded
        } else {
            BuildPhase::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_phase_classification() {
        for state in NON_TERMINAL_BUILD_STATES {
            assert_eq!(BuildPhase::classify(state), BuildPhase::InProgress);
        }
        assert_eq!(BuildPhase::classify("succeeded"), BuildPhase::Succeeded);
        assert_eq!(BuildPhase::classify("failed"), BuildPhase::Failed);
        assert_eq!(BuildPhase::classify("canceled"), BuildPhase::Failed);
        assert_eq!(BuildPhase::classify(""), BuildPhase::Failed);
    }

    #[test]
    fn test_status_state_terminality() {
        assert!(!StatusState::Queued.is_terminal());
        assert!(!StatusState::InProgress.is_terminal());
        assert!(StatusState::Success.is_terminal());
        assert!(StatusState::Failure.is_terminal());
        assert!(StatusState::OtherTerminal("neutral".to_string()).is_terminal());
        assert!(StatusState::Queued.is_queued());
        assert!(!StatusState::InProgress.is_queued());
    }

    #[test]
    fn test_forge_kind_serde_names() {
        assert_eq!(serde_json::to_string(&ForgeKind::GitHub).unwrap(), "\"github\"");
        let kind: ForgeKind = serde_json::from_str("\"gitlab\"").unwrap();
        assert_eq!(kind, ForgeKind::GitLab);
    }
}
