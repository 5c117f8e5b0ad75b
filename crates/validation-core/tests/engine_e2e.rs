//! Whole validation runs against the in-memory forge and build system.

use std::sync::Arc;
use std::time::Duration;

use tracing_test::traced_test;
use validation_core::fakes::{FakeClock, MemoryForge, RecordingSink, ScriptedBuildSystem, Timeline};
use validation_core::{
    Build, DeploymentProfile, ForgeKind, Status, StatusState, TestCase, Trigger,
    ValidationConfig, ValidationRun, ValidationSuite,
};

const OPENED_BRANCH: &str = "test_case_opened_pr";

struct World {
    clock: Arc<FakeClock>,
    forge: Arc<MemoryForge>,
    builds: Arc<ScriptedBuildSystem>,
    sink: Arc<RecordingSink>,
}

impl World {
    fn new(kind: ForgeKind) -> Self {
        let clock = Arc::new(FakeClock::new());
        Self {
            forge: Arc::new(MemoryForge::new(kind, clock.clone())),
            builds: Arc::new(ScriptedBuildSystem::new(clock.clone())),
            sink: Arc::new(RecordingSink::new()),
            clock,
        }
    }

    fn engine(&self, profile: DeploymentProfile) -> ValidationRun {
        ValidationRun::new(
            self.forge.clone(),
            self.builds.clone(),
            profile,
            ValidationConfig::default(),
        )
        .with_clock(self.clock.clone())
        .with_sink(self.sink.clone())
    }

    /// No statuses for 10 s, then one check run going pending → success.
    fn script_quick_status(&self, owner: &str) {
        let check = |state| Status {
            name: "rpm-build:fedora-rawhide".to_string(),
            owner: owner.to_string(),
            state,
            message: String::new(),
        };
        self.forge.script_statuses(
            Timeline::new()
                .at(secs(0), vec![])
                .at(secs(10), vec![check(StatusState::Queued)])
                .at(secs(20), vec![check(StatusState::Success)]),
        );
    }

    fn script_single_build(&self, states: &[&str]) {
        self.builds.script_builds(Timeline::new().at(
            secs(30),
            vec![Build {
                id: 1,
                state: "pending".to_string(),
            }],
        ));
        self.builds.script_states(1, states);
    }
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

#[tokio::test]
async fn production_opened_pr_passes_and_cleans_up() {
    let world = World::new(ForgeKind::GitHub);
    world.script_quick_status("Packit-as-a-Service");
    world.script_single_build(&["succeeded"]);
    let run = world.engine(DeploymentProfile::production());
    let mut case = TestCase::opened_pr();

    let outcome = run.run_test(&mut case).await.unwrap();

    assert!(outcome.passed, "unexpected failure: {}", outcome.failure);
    assert_eq!(outcome.failure, "");
    assert!(case.failure.is_empty());

    let pr = case.pr.as_ref().unwrap();
    assert_eq!(outcome.pr_url.as_deref(), Some(pr.url.as_str()));
    assert!(!world.forge.is_open(pr.id));
    assert!(!world.forge.has_branch(OPENED_BRANCH));
    assert!(world.sink.messages().is_empty());
}

#[tokio::test]
async fn failed_build_without_bot_comment_is_reported_to_sink() {
    let world = World::new(ForgeKind::GitHub);
    world.script_quick_status("Packit-as-a-Service");
    world.script_single_build(&["running", "failed"]);
    let run = world.engine(DeploymentProfile::production());
    let mut case = TestCase::opened_pr();

    let outcome = run.run_test(&mut case).await.unwrap();

    assert!(!outcome.passed);
    assert_eq!(case.failure.entries(), 2);
    assert!(case.failure.build_failed());
    assert!(case.failure.contains("No failure comment from"));

    let messages = world.sink.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with(
        "Basic test case - opened PR trigger (https://forge.test/packit/hello-world/pull/1) failed:"
    ));

    // cleanup still happens on failure
    assert!(!world.forge.is_open(1));
    assert!(!world.forge.has_branch(OPENED_BRANCH));
}

#[tokio::test]
async fn rejected_submission_skips_build_checks() {
    let world = World::new(ForgeKind::GitHub);
    world.script_quick_status("Packit-as-a-Service");
    world.forge.reply_with(validation_core::Comment {
        author: "packit-as-a-service[bot]".to_string(),
        body: "There was an error while submitting the build.".to_string(),
    });
    let pr = world
        .forge
        .add_pull_request("Basic test case: rejected", "rejected");
    let run = world.engine(DeploymentProfile::production());
    let mut case = TestCase::for_pr(pr.clone(), Trigger::Comment);

    let outcome = run.run_test(&mut case).await.unwrap();

    assert!(!outcome.passed);
    assert_eq!(case.failure.entries(), 1);
    assert_eq!(world.builds.get_calls(), 0);
    // comment-triggered PRs are kept open
    assert!(world.forge.is_open(pr.id));
}

#[tokio::test]
async fn staging_gitlab_run_uses_staging_identity() {
    let world = World::new(ForgeKind::GitLab);
    world.script_quick_status("packit-as-a-service-stg");
    world.script_single_build(&["importing", "running", "succeeded"]);
    let run = world.engine(DeploymentProfile::staging());
    let mut case = TestCase::opened_pr();

    let outcome = run.run_test(&mut case).await.unwrap();

    assert!(outcome.passed, "unexpected failure: {}", outcome.failure);
    assert_eq!(outcome.trigger, Trigger::PrOpened);
    assert!(!world.forge.has_branch(OPENED_BRANCH));
}

#[tokio::test]
async fn production_run_ignores_staging_statuses() {
    let world = World::new(ForgeKind::GitHub);
    world.script_quick_status("Packit-as-a-Service-stg");
    world.script_single_build(&["succeeded"]);
    let run = world.engine(DeploymentProfile::production());
    let mut case = TestCase::opened_pr();

    let outcome = run.run_test(&mut case).await.unwrap();

    assert!(outcome.failure.contains("not set to queued"));
    // the build is still followed after a pending timeout
    assert_eq!(world.builds.get_calls(), 1);
}

#[tokio::test]
#[traced_test]
async fn run_emits_lifecycle_events() {
    let world = World::new(ForgeKind::GitHub);
    world.script_quick_status("Packit-as-a-Service");
    world.script_single_build(&["succeeded"]);
    let run = world.engine(DeploymentProfile::production());
    let mut case = TestCase::opened_pr();

    run.run_test(&mut case).await.unwrap();

    assert!(logs_contain("case.started"));
    assert!(logs_contain("build.found"));
    assert!(logs_contain("case.finished"));
    assert!(logs_contain("validation.case"));
}

#[tokio::test]
async fn run_can_be_spawned() {
    let world = World::new(ForgeKind::GitHub);
    world.script_quick_status("Packit-as-a-Service");
    world.script_single_build(&["succeeded"]);
    let run = world.engine(DeploymentProfile::production());

    let outcome = tokio::spawn(async move {
        let mut case = TestCase::opened_pr();
        run.run_test(&mut case).await
    })
    .await
    .unwrap()
    .unwrap();

    assert!(outcome.passed, "{}", outcome.failure);
}

#[tokio::test]
async fn suite_discovers_cases_like_the_cron_job() {
    let world = World::new(ForgeKind::GitHub);
    world
        .forge
        .add_pull_request("Basic test case: rpm build", "rpm-build");
    world
        .forge
        .add_pull_request("Basic test case: tests", "tests");
    world
        .forge
        .add_pull_request("Basic test case - push trigger", "push-trigger");
    world
        .forge
        .add_pull_request("Basic test case (stg) - push trigger", "push-trigger-stg");
    world.forge.add_pull_request("Unrelated change", "unrelated");

    let suite = ValidationSuite::new(world.engine(DeploymentProfile::production()));
    let cases = suite.discover().await.unwrap();

    let triggers: Vec<Trigger> = cases.iter().map(|c| c.trigger).collect();
    assert_eq!(
        triggers,
        vec![
            Trigger::Comment,
            Trigger::Comment,
            Trigger::Push,
            Trigger::PrOpened
        ]
    );
    assert_eq!(
        cases[2].pr.as_ref().unwrap().title,
        "Basic test case - push trigger"
    );

    let staging = ValidationSuite::new(world.engine(DeploymentProfile::staging()));
    let cases = staging.discover().await.unwrap();
    assert_eq!(
        cases[2].pr.as_ref().unwrap().title,
        "Basic test case (stg) - push trigger"
    );
}
