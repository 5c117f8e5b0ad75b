//! Capability traits for the external collaborators.
//!
//! - `SourceForge`: statuses, comments, branches, files and pull requests
//! - `BuildSystem`: build listing and lookup
//! - `ErrorSink`: where failure summaries go
//!
//! Backends are picked at construction time and passed into the engine.
//! In-memory fakes live in the `fakes` module.

use async_trait::async_trait;

use crate::error::{BuildResult, ForgeResult};
use crate::model::{Build, Comment, FileContent, ForgeKind, PullRequest, Status};

/// One repository on a source-hosting service.
#[async_trait]
pub trait SourceForge: Send + Sync {
    fn kind(&self) -> ForgeKind;

    /// `namespace/repo` (or full path for nested GitLab groups).
    fn repository(&self) -> String;

    /// Build project associated with a PR.
    fn build_project_name(&self, pr: &PullRequest) -> String;

    /// Statuses attached to a commit, fresh on every call.
    async fn statuses(&self, commit: &str) -> ForgeResult<Vec<Status>>;

    /// PR comments, oldest first.
    async fn comments(&self, pr: &PullRequest) -> ForgeResult<Vec<Comment>>;

    async fn post_comment(&self, pr: &PullRequest, body: &str) -> ForgeResult<()>;

    /// Open pull requests.
    async fn pull_requests(&self) -> ForgeResult<Vec<PullRequest>>;

    async fn default_branch(&self) -> ForgeResult<String>;

    /// Head commit of a branch, `None` if the branch does not exist.
    async fn branch_head(&self, branch: &str) -> ForgeResult<Option<String>>;

    async fn create_branch(&self, branch: &str, commit: &str) -> ForgeResult<()>;

    async fn delete_branch(&self, branch: &str) -> ForgeResult<()>;

    /// File on a branch, `None` if missing.
    async fn read_file(&self, path: &str, branch: &str) -> ForgeResult<Option<FileContent>>;

    /// Create a file; returns the new commit.
    async fn create_file(
        &self,
        path: &str,
        branch: &str,
        message: &str,
        content: &str,
    ) -> ForgeResult<String>;

    /// Replace a file's content; returns the new commit.
    async fn update_file(
        &self,
        file: &FileContent,
        branch: &str,
        message: &str,
        content: &str,
    ) -> ForgeResult<String>;

    async fn create_pull_request(
        &self,
        title: &str,
        body: &str,
        source_branch: &str,
        target_branch: &str,
    ) -> ForgeResult<PullRequest>;

    async fn close_pull_request(&self, pr: &PullRequest) -> ForgeResult<()>;
}

/// Build system hosting one project per PR.
#[async_trait]
pub trait BuildSystem: Send + Sync {
    /// Display name for failure messages.
    fn name(&self) -> &str;

    /// Builds of a project, newest first.
    async fn list_builds(&self, owner: &str, project: &str) -> BuildResult<Vec<Build>>;

    async fn get_build(&self, build_id: u64) -> BuildResult<Build>;
}

/// Destination for failure summaries.
#[async_trait]
pub trait ErrorSink: Send + Sync {
    async fn capture_message(&self, message: &str) -> anyhow::Result<()>;
}
