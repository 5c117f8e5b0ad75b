//! Forge Clients: HTTP backends for the validation engine
//!
//! - `GitHubForge` / `GitLabForge`: `SourceForge` over the REST APIs
//! - `CoprClient`: `BuildSystem` over Copr API v3
//! - `SentrySink`: `ErrorSink` posting to a Sentry store endpoint
//! - `ForgeSettings`: tokens and repository coordinates from the environment
//! - `HttpTimeouts`: request and connect limits shared by every client

mod copr;
mod error;
mod github;
mod gitlab;
mod http;
mod sentry;
mod settings;

pub use copr::CoprClient;
pub use error::{ClientError, Result, SinkError};
pub use github::{check_run_state, GitHubForge, COMMITTER_EMAIL, COMMITTER_NAME};
pub use gitlab::{commit_status_state, gitlab_project_name, GitLabForge};
pub use http::HttpTimeouts;
pub use sentry::{SentryDsn, SentrySink};
pub use settings::{
    split_repository, ForgeSettings, DEFAULT_COPR_URL, DEFAULT_GITHUB_API,
    DEFAULT_GITHUB_REPOSITORY, DEFAULT_GITLAB_REPOSITORY, DEFAULT_GITLAB_URL,
};
