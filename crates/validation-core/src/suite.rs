//! The cron job's test plan for one forge.

use tracing::info;

use crate::error::Result;
use crate::profile::Trigger;
use crate::run::{CaseOutcome, ValidationRun};
use crate::test_case::TestCase;

/// Discovers the test cases on a repository and runs them one by one.
pub struct ValidationSuite {
    run: ValidationRun,
}

impl ValidationSuite {
    pub fn new(run: ValidationRun) -> Self {
        Self { run }
    }

    /// Comment trigger for every `Basic test case:` PR, push trigger for the
    /// first PR with the deployment's push prefix, then one opened PR.
    pub async fn discover(&self) -> Result<Vec<TestCase>> {
        let profile = self.run.profile();
        let prs = self.run.forge().pull_requests().await?;

        let mut cases: Vec<TestCase> = prs
            .iter()
            .filter(|pr| pr.title.starts_with(&profile.comment_trigger_prefix))
            .map(|pr| TestCase::for_pr(pr.clone(), Trigger::Comment))
            .collect();

        if let Some(pr) = prs
            .iter()
            .find(|pr| pr.title.starts_with(&profile.push_trigger_prefix))
        {
            cases.push(TestCase::for_pr(pr.clone(), Trigger::Push));
        }

        cases.push(TestCase::opened_pr());
        Ok(cases)
    }

    /// Run every discovered test case sequentially.
    ///
    /// A fatal error in one test case stops the suite.
    pub async fn run_all(&self) -> Result<Vec<CaseOutcome>> {
        let cases = self.discover().await?;
        info!(
            repository = %self.run.forge().repository(),
            deployment = self.run.profile().deployment.name(),
            cases = cases.len(),
            "starting validation"
        );

        let mut outcomes = Vec::with_capacity(cases.len());
        for mut case in cases {
            outcomes.push(self.run.run_test(&mut case).await?);
        }
        Ok(outcomes)
    }
}
