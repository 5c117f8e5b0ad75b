//! One validation attempt.

use uuid::Uuid;

use crate::model::PullRequest;
use crate::profile::Trigger;
use crate::report::FailureReport;

/// A pull request plus the trigger used to provoke a build on it.
///
/// For [`Trigger::PrOpened`] the pull request is `None` until the trigger
/// dispatcher creates it.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub id: Uuid,
    pub trigger: Trigger,
    pub pr: Option<PullRequest>,
    pub head_commit: Option<String>,
    /// Branch created by the opened-PR trigger, deleted on cleanup.
    pub created_branch: Option<String>,
    pub failure: FailureReport,
}

impl TestCase {
    /// Test case on an existing PR.
    pub fn for_pr(pr: PullRequest, trigger: Trigger) -> Self {
        let head_commit = Some(pr.head_commit.clone());
        Self {
            id: Uuid::new_v4(),
            trigger,
            pr: Some(pr),
            head_commit,
            created_branch: None,
            failure: FailureReport::new(),
        }
    }

    /// Test case that opens its own PR.
    pub fn opened_pr() -> Self {
        Self {
            id: Uuid::new_v4(),
            trigger: Trigger::PrOpened,
            pr: None,
            head_commit: None,
            created_branch: None,
            failure: FailureReport::new(),
        }
    }

    /// `"<title> (<url>)"`, or the trigger name before a PR exists.
    pub fn describe(&self) -> String {
        match &self.pr {
            Some(pr) => format!("{} ({})", pr.title, pr.url),
            None => format!("{} test case", self.trigger.name()),
        }
    }

    pub fn passed(&self) -> bool {
        self.failure.is_empty()
    }
}
