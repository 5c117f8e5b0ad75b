//! Final status verification once the build is done.

use tracing::debug;

use crate::clock::Deadline;
use crate::error::{Result, ValidationError};
use crate::model::{Status, StatusState};
use crate::run::ValidationRun;
use crate::test_case::TestCase;

impl ValidationRun {
    /// Wait for every deployment status to complete, then flag the ones that
    /// failed even though the build succeeded.
    ///
    /// Does nothing, not even a forge call, once the build is known to have
    /// failed.
    pub async fn check_completed_statuses(&self, case: &mut TestCase) -> Result<()> {
        if case.failure.build_failed() {
            debug!("build failed, skipping status verification");
            return Ok(());
        }
        let Some(statuses) = self.watch_statuses(case).await? else {
            return Ok(());
        };

        let kind = self.forge.kind();
        let system = self.builds.name().to_string();
        for status in statuses
            .iter()
            .filter(|s| s.state == StatusState::Failure)
        {
            let message = format!(
                "{} {} was set to failure although the {system} build was successful, message: {}.",
                kind.status_label(),
                status.name,
                status.message
            );
            self.record_failure(case, "completion", message);
        }
        Ok(())
    }

    /// Poll until all deployment statuses are terminal. `None` on timeout,
    /// after listing the ones still running.
    async fn watch_statuses(&self, case: &mut TestCase) -> Result<Option<Vec<Status>>> {
        let commit = case
            .head_commit
            .clone()
            .ok_or(ValidationError::MissingHeadCommit)?;
        let deadline = Deadline::after(self.clock.as_ref(), self.config.completion_timeout());
        let mut last_seen: Vec<Status> = Vec::new();

        loop {
            if let Some(statuses) = self.deployment_statuses(&commit).await {
                if statuses.iter().all(|s| s.state.is_terminal()) {
                    return Ok(Some(statuses));
                }
                last_seen = statuses;
            }

            if deadline.expired(self.clock.as_ref()) {
                let incomplete: Vec<&str> = last_seen
                    .iter()
                    .filter(|s| !s.state.is_terminal())
                    .map(|s| s.name.as_str())
                    .collect();
                let message = format!(
                    "These {} were not completed {} after {} build had been built:\n{}",
                    self.forge.kind().status_noun(),
                    deadline.describe(),
                    self.builds.name(),
                    incomplete.join("\n")
                );
                self.record_failure(case, "completion", message);
                return Ok(None);
            }
            self.pause(self.config.completion_interval(), &deadline)
                .await;
        }
    }
}
