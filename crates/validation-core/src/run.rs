//! Run orchestration: sequence the phases, clean up, report.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

use crate::clock::{Clock, Deadline, SystemClock};
use crate::config::ValidationConfig;
use crate::error::Result;
use crate::model::Status;
use crate::obs;
use crate::profile::{DeploymentProfile, ForgeIdentity, Trigger};
use crate::sink::LogSink;
use crate::test_case::TestCase;
use crate::traits::{BuildSystem, ErrorSink, SourceForge};

/// Result of one test case, as printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct CaseOutcome {
    pub case_id: Uuid,
    pub trigger: Trigger,
    pub repository: String,
    pub pr_title: Option<String>,
    pub pr_url: Option<String>,
    pub passed: bool,
    pub failure: String,
}

impl CaseOutcome {
    fn from_case(case: &TestCase, repository: String) -> Self {
        Self {
            case_id: case.id,
            trigger: case.trigger,
            repository,
            pr_title: case.pr.as_ref().map(|pr| pr.title.clone()),
            pr_url: case.pr.as_ref().map(|pr| pr.url.clone()),
            passed: case.passed(),
            failure: case.failure.as_str().to_string(),
        }
    }
}

/// Validation engine bound to one forge, one build system and one profile.
///
/// Collaborators are explicit and live as long as the run; nothing is global.
pub struct ValidationRun {
    pub(crate) forge: Arc<dyn SourceForge>,
    pub(crate) builds: Arc<dyn BuildSystem>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) sink: Arc<dyn ErrorSink>,
    pub(crate) profile: DeploymentProfile,
    pub(crate) config: ValidationConfig,
}

impl ValidationRun {
    /// Engine on the system clock, reporting failures as warnings.
    pub fn new(
        forge: Arc<dyn SourceForge>,
        builds: Arc<dyn BuildSystem>,
        profile: DeploymentProfile,
        config: ValidationConfig,
    ) -> Self {
        Self {
            forge,
            builds,
            clock: Arc::new(SystemClock),
            sink: Arc::new(LogSink),
            profile,
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn profile(&self) -> &DeploymentProfile {
        &self.profile
    }

    pub fn forge(&self) -> &dyn SourceForge {
        self.forge.as_ref()
    }

    /// Run every check, clean up after an opened PR and report failures.
    ///
    /// Validation failures end up in the outcome; only setup failures
    /// (branch, file or PR creation) are returned as errors.
    pub async fn run_test(&self, case: &mut TestCase) -> Result<CaseOutcome> {
        let span = obs::case_span(case.id, case.trigger, &self.forge.repository());
        self.run_case(case).instrument(span).await
    }

    async fn run_case(&self, case: &mut TestCase) -> Result<CaseOutcome> {
        let repository = self.forge.repository();
        obs::emit_case_started(case.id, case.trigger);

        let checks = self.run_checks(case).await;

        if case.trigger == Trigger::PrOpened {
            self.cleanup(case).await;
        }
        checks?;

        if !case.failure.is_empty() {
            let message = format!("{} failed: {}", case.describe(), case.failure);
            if let Err(e) = self.sink.capture_message(&message).await {
                obs::emit_cleanup_error("report", &e);
                warn!("{message}");
            }
        }

        obs::emit_case_finished(case.id, case.passed(), case.failure.entries());
        Ok(CaseOutcome::from_case(case, repository))
    }

    /// Submission → build → statuses → comment; stops early without a build.
    pub async fn run_checks(&self, case: &mut TestCase) -> Result<()> {
        let Some(build) = self.watch_submission(case).await? else {
            debug!("no build found, skipping remaining checks");
            return Ok(());
        };

        self.watch_build(case, build.id).await;
        self.check_completed_statuses(case).await?;
        self.check_failure_comment(case).await?;
        Ok(())
    }

    /// Close the opened PR and delete its branch; problems are only logged.
    async fn cleanup(&self, case: &TestCase) {
        if let Some(pr) = &case.pr {
            if let Err(e) = self.forge.close_pull_request(pr).await {
                obs::emit_cleanup_error("close pull request", &e);
            }
        }
        if let Some(branch) = &case.created_branch {
            if let Err(e) = self.forge.delete_branch(branch).await {
                obs::emit_cleanup_error("delete branch", &e);
            }
        }
    }

    pub(crate) fn identity(&self) -> &ForgeIdentity {
        self.profile.identity(self.forge.kind())
    }

    /// Statuses owned by the deployment, or `None` when the forge call failed.
    pub(crate) async fn deployment_statuses(&self, commit: &str) -> Option<Vec<Status>> {
        match self.forge.statuses(commit).await {
            Ok(statuses) => {
                let owner = &self.identity().status_owner;
                Some(
                    statuses
                        .into_iter()
                        .filter(|s| &s.owner == owner)
                        .collect(),
                )
            }
            Err(e) => {
                warn!(error = %e, commit = %commit, "fetching statuses failed, retrying");
                None
            }
        }
    }

    pub(crate) fn record_failure(&self, case: &mut TestCase, phase: &str, message: String) {
        obs::emit_phase_failure(phase, &message);
        case.failure.push(message);
    }

    /// Sleep for `interval`, but never past the deadline.
    pub(crate) async fn pause(&self, interval: Duration, deadline: &Deadline) {
        let remaining = deadline.remaining(self.clock.as_ref());
        let nap = interval.min(remaining);
        if !nap.is_zero() {
            self.clock.sleep(nap).await;
        }
    }
}
