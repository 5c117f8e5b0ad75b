//! Checking that the bot explained a failed build.

use crate::error::{Result, ValidationError};
use crate::run::ValidationRun;
use crate::test_case::TestCase;

impl ValidationRun {
    /// After a failed build the bot must have commented on the PR.
    pub async fn check_failure_comment(&self, case: &mut TestCase) -> Result<()> {
        if !case.failure.build_failed() {
            return Ok(());
        }
        let pr = case
            .pr
            .as_ref()
            .ok_or(ValidationError::MissingPullRequest("failure comment"))?;

        let bot = self.identity().comment_author.clone();
        let commented = self
            .forge
            .comments(pr)
            .await?
            .iter()
            .any(|c| c.author == bot);

        if !commented {
            let message = format!(
                "No failure comment from {bot} found about the unsuccessful {} build.",
                self.builds.name()
            );
            self.record_failure(case, "comment", message);
        }
        Ok(())
    }
}
