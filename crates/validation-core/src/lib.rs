//! Validation Core: the build-validation run engine
//!
//! Provokes a build on a test repository and follows it through the
//! source forge and the build system, collecting every anomaly into one
//! failure report per test case.
//!
//! ## Phases
//!
//! trigger → pending statuses → build submission → build completion →
//! status verification → failure comment → cleanup
//!
//! ## Key Components
//!
//! - `ValidationRun`: the engine, built from explicit collaborators
//! - `SourceForge` / `BuildSystem` / `ErrorSink`: capability traits
//! - `Clock`: injectable time, so every watcher runs under a fake clock in tests
//! - `ValidationSuite`: the cron job's per-forge test plan

mod build_watch;
pub mod clock;
mod comments;
mod completion;
pub mod config;
mod error;
pub mod fakes;
pub mod model;
pub mod obs;
pub mod pending;
pub mod profile;
pub mod report;
mod run;
mod sink;
mod suite;
pub mod telemetry;
mod test_case;
pub mod traits;
pub mod trigger;

pub use clock::{describe_duration, Clock, Deadline, SystemClock};
pub use config::ValidationConfig;
pub use error::{BuildError, BuildResult, ForgeError, ForgeResult, Result, ValidationError};
pub use model::{
    Build, BuildPhase, Comment, FileContent, ForgeKind, PullRequest, Status, StatusState,
    BUILD_SUCCEEDED, NON_TERMINAL_BUILD_STATES,
};
pub use pending::PendingState;
pub use profile::{
    ConfigPatch, Deployment, DeploymentProfile, ForgeIdentity, Trigger, COMMENT_TEST_PREFIX,
    DEPLOYMENT_ENV,
};
pub use report::{FailureReport, BUILD_FAILURE_MARKER};
pub use run::{CaseOutcome, ValidationRun};
pub use sink::LogSink;
pub use suite::ValidationSuite;
pub use telemetry::init_tracing;
pub use test_case::TestCase;
pub use traits::{BuildSystem, ErrorSink, SourceForge};

/// Version stamped into logs and the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
