//! Watching the build system: first for the build to show up, then for it
//! to finish.

use tracing::{debug, warn};

use crate::clock::Deadline;
use crate::error::{Result, ValidationError};
use crate::model::{Build, BuildPhase, Comment};
use crate::obs;
use crate::report::BUILD_FAILURE_MARKER;
use crate::run::ValidationRun;
use crate::test_case::TestCase;

/// Counts taken before the trigger fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Snapshot {
    builds: usize,
    comments: usize,
}

impl ValidationRun {
    /// Trigger the build and wait for it to appear in the build system.
    ///
    /// Returns the newest build once the project has more builds than before
    /// the trigger, or `None` when the build was rejected or never showed up.
    pub async fn watch_submission(&self, case: &mut TestCase) -> Result<Option<Build>> {
        let snapshot = self.snapshot(case).await?;
        debug!(?snapshot, "before trigger");

        self.trigger_build(case).await?;
        let deadline = Deadline::after(self.clock.as_ref(), self.config.submit_timeout());
        self.watch_pending(case).await?;

        let pr = case
            .pr
            .clone()
            .ok_or(ValidationError::MissingPullRequest("build submission"))?;
        let project = self.forge.build_project_name(&pr);
        let system = self.builds.name().to_string();
        let mut reported_comments = 0;

        loop {
            if deadline.expired(self.clock.as_ref()) {
                let message = format!(
                    "The build was not submitted in {system} in time {}.",
                    deadline.describe()
                );
                self.record_failure(case, "submission", message);
                return Ok(None);
            }

            let builds = self.list_builds_or_empty(&project).await;
            if builds.len() > snapshot.builds {
                let newest = builds.into_iter().next();
                if let Some(build) = newest {
                    obs::emit_build_found(&project, build.id, snapshot.builds);
                    return Ok(Some(build));
                }
            }

            match self.forge.comments(&pr).await {
                Ok(comments) => {
                    let bot_comments = self.new_bot_comments(&comments, snapshot.comments);
                    if let Some(rejection) = bot_comments
                        .iter()
                        .rev()
                        .find(|c| self.config.is_rejection(&c.body))
                    {
                        let message = format!(
                            "The build was not submitted in {system}, {} comment from {}: {}",
                            self.forge.kind(),
                            rejection.author,
                            rejection.body
                        );
                        self.record_failure(case, "submission", message);
                        return Ok(None);
                    }
                    for comment in bot_comments.iter().skip(reported_comments) {
                        let message = format!(
                            "New {} comment from {} while submitting {system} build: {}",
                            self.forge.kind(),
                            comment.author,
                            comment.body
                        );
                        self.record_failure(case, "submission", message);
                    }
                    reported_comments = reported_comments.max(bot_comments.len());
                }
                Err(e) => warn!(error = %e, "fetching comments failed, retrying"),
            }

            self.pause(self.config.submit_interval(), &deadline).await;
        }
    }

    /// Follow a submitted build until it reaches a terminal state.
    ///
    /// Only state changes are acted on; a repeated state just waits for the
    /// shorter repeat interval.
    pub async fn watch_build(&self, case: &mut TestCase, build_id: u64) {
        let deadline = Deadline::after(self.clock.as_ref(), self.config.build_timeout());
        let system = self.builds.name().to_string();
        let mut last_state: Option<String> = None;

        loop {
            if deadline.expired(self.clock.as_ref()) {
                let message =
                    format!("The build did not finish in time {}.", deadline.describe());
                self.record_failure(case, "build", message);
                return;
            }

            let build = match self.builds.get_build(build_id).await {
                Ok(build) => build,
                Err(e) => {
                    warn!(error = %e, build_id, "fetching build failed, retrying");
                    self.pause(self.config.build_repeat_interval(), &deadline)
                        .await;
                    continue;
                }
            };

            if last_state.as_deref() == Some(build.state.as_str()) {
                self.pause(self.config.build_repeat_interval(), &deadline)
                    .await;
                continue;
            }
            obs::emit_build_state(build_id, &build.state);

            match BuildPhase::classify(&build.state) {
                BuildPhase::InProgress => {
                    last_state = Some(build.state);
                    self.pause(self.config.build_interval(), &deadline).await;
                }
                BuildPhase::Succeeded => return,
                BuildPhase::Failed => {
                    let message = format!(
                        "The {system} {BUILD_FAILURE_MARKER}. {system} state: {}.",
                        build.state
                    );
                    self.record_failure(case, "build", message);
                    return;
                }
            }
        }
    }

    /// Build and comment counts before triggering. A PR that does not exist
    /// yet has neither.
    async fn snapshot(&self, case: &TestCase) -> Result<Snapshot> {
        let Some(pr) = &case.pr else {
            return Ok(Snapshot::default());
        };
        let project = self.forge.build_project_name(pr);
        Ok(Snapshot {
            builds: self.list_builds_or_empty(&project).await.len(),
            comments: self.forge.comments(pr).await?.len(),
        })
    }

    /// Listing errors usually mean the project is not created yet.
    async fn list_builds_or_empty(&self, project: &str) -> Vec<Build> {
        match self
            .builds
            .list_builds(&self.profile.build_owner, project)
            .await
        {
            Ok(builds) => builds,
            Err(e) => {
                debug!(error = %e, project = %project, "no builds yet");
                Vec::new()
            }
        }
    }

    /// Comments by the deployment's bot posted after the snapshot, oldest first.
    pub(crate) fn new_bot_comments<'a>(
        &self,
        comments: &'a [Comment],
        already_seen: usize,
    ) -> Vec<&'a Comment> {
        let author = &self.identity().comment_author;
        comments
            .iter()
            .skip(already_seen)
            .filter(|c| &c.author == author)
            .collect()
    }
}
