//! Provoking a build: comment, push or a freshly opened PR.

use tracing::{debug, info};

use crate::error::{ForgeError, Result, ValidationError};
use crate::obs;
use crate::profile::Trigger;
use crate::run::ValidationRun;
use crate::test_case::TestCase;

/// File touched by the push and opened-PR triggers.
pub const PLACEHOLDER_FILE: &str = "test.txt";

const PUSH_CONTENT: &str = "Testing the push trigger.";
const OPENED_PR_MESSAGE: &str = "Opened PR trigger";
const OPENED_PR_CONTENT: &str = "Testing the opened PR trigger.";
const OPENED_PR_BODY: &str =
    "This test case is triggered automatically by our validation script.";

impl ValidationRun {
    /// Perform the test case's trigger. Every failure here is fatal.
    pub async fn trigger_build(&self, case: &mut TestCase) -> Result<()> {
        match case.trigger {
            Trigger::Comment => self.trigger_comment(case).await?,
            Trigger::Push => self.trigger_push(case).await?,
            Trigger::PrOpened => self.open_pull_request(case).await?,
        }
        obs::emit_build_triggered(case.trigger, case.pr.as_ref().map(|pr| pr.id));
        Ok(())
    }

    async fn trigger_comment(&self, case: &TestCase) -> Result<()> {
        let pr = case
            .pr
            .as_ref()
            .ok_or(ValidationError::MissingPullRequest("comment trigger"))?;
        self.forge.post_comment(pr, &self.profile.pr_comment).await?;
        Ok(())
    }

    /// Rewrite the placeholder file so the branch gets a new commit even
    /// though the content never changes.
    async fn trigger_push(&self, case: &mut TestCase) -> Result<()> {
        let pr = case
            .pr
            .as_ref()
            .ok_or(ValidationError::MissingPullRequest("push trigger"))?;
        let message = push_commit_message(self.clock.today());

        let commit = match self
            .forge
            .read_file(PLACEHOLDER_FILE, &pr.source_branch)
            .await?
        {
            Some(file) => {
                self.forge
                    .update_file(&file, &pr.source_branch, &message, PUSH_CONTENT)
                    .await?
            }
            None => {
                self.forge
                    .create_file(PLACEHOLDER_FILE, &pr.source_branch, &message, PUSH_CONTENT)
                    .await?
            }
        };
        debug!(commit = %commit, branch = %pr.source_branch, "pushed trigger commit");
        case.head_commit = Some(commit);
        Ok(())
    }

    /// Replace whatever the previous run left behind with a fresh PR.
    async fn open_pull_request(&self, case: &mut TestCase) -> Result<()> {
        let branch = self.profile.opened_pr_branch.clone();
        let title = self.profile.opened_pr_title.clone();

        if self.forge.branch_head(&branch).await?.is_some() {
            info!(branch = %branch, "deleting branch left by a previous run");
            self.forge.delete_branch(&branch).await?;
        }
        for stale in self
            .forge
            .pull_requests()
            .await?
            .into_iter()
            .filter(|pr| pr.title == title)
        {
            info!(pr = stale.id, "closing PR left by a previous run");
            self.forge.close_pull_request(&stale).await?;
        }

        let default_branch = self.forge.default_branch().await?;
        let base = self
            .forge
            .branch_head(&default_branch)
            .await?
            .ok_or_else(|| ForgeError::NotFound(format!("default branch {default_branch}")))?;

        self.forge.create_branch(&branch, &base).await?;
        case.created_branch = Some(branch.clone());

        self.forge
            .create_file(PLACEHOLDER_FILE, &branch, OPENED_PR_MESSAGE, OPENED_PR_CONTENT)
            .await?;
        self.apply_config_patch(&branch).await?;

        let pr = self
            .forge
            .create_pull_request(&title, OPENED_PR_BODY, &branch, &default_branch)
            .await?;
        info!(pr = pr.id, url = %pr.url, "opened PR");
        case.head_commit = Some(pr.head_commit.clone());
        case.pr = Some(pr);
        Ok(())
    }

    async fn apply_config_patch(&self, branch: &str) -> Result<()> {
        let Some(patch) = &self.profile.config_patch else {
            return Ok(());
        };
        let Some(file) = self.forge.read_file(&patch.path, branch).await? else {
            debug!(path = %patch.path, "no config to patch");
            return Ok(());
        };
        let patched = patch.apply(&file.content);
        if patched != file.content {
            self.forge
                .update_file(&file, branch, &patch.commit_message, &patched)
                .await?;
        }
        Ok(())
    }
}

/// `Commit build trigger (05/03/24)`.
pub fn push_commit_message(day: chrono::NaiveDate) -> String {
    format!("Commit build trigger ({})", day.format("%d/%m/%y"))
}
