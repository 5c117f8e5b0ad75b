//! Weekly promotion of `main` to `stable` across the service repositories.
//!
//! [`RepoStore`] is the directory holding local clones of every repository
//! plus the deployment monorepo that pins their `stable` heads as
//! submodules. The interactive flow (prompting for the new hash, confirming
//! the push) lives in the CLI; this module only runs git.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Days, NaiveDate};
use tracing::{info, warn};

use crate::changelog::{self, RepoLink};
use crate::error::{ReleaseError, Result};
use crate::git;

pub const NAMESPACE: &str = "packit";

/// Repositories whose `stable` branch is moved, in dependency order.
pub const REPOSITORIES: [&str; 7] = [
    "ogr",
    "specfile",
    "packit",
    "packit-service-fedmsg",
    "sandcastle",
    "dashboard",
    "packit-service",
];

/// Repositories whose release notes make it into the weekly blog post.
pub const REPOS_FOR_BLOG: [&str; 5] = ["packit", "packit-service", "dashboard", "ogr", "specfile"];

pub const STABLE_BRANCH: &str = "stable";
pub const ROLLING_BRANCH: &str = "main";
pub const DEFAULT_REPO_STORE: &str = "move_stable_repositories";
pub const MONOREPO: &str = "production-monorepo";

/// Abbreviated heads of the rolling and stable branches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchHeads {
    pub main: String,
    pub stable: String,
}

impl BranchHeads {
    /// Nothing to promote.
    pub fn is_even(&self) -> bool {
        self.main == self.stable
    }
}

/// Local clones the promotion works on.
#[derive(Debug, Clone)]
pub struct RepoStore {
    root: PathBuf,
    remote: String,
}

impl RepoStore {
    pub fn new(root: impl Into<PathBuf>, remote: &str) -> Self {
        Self {
            root: root.into(),
            remote: remote.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    pub fn path(&self, repository: &str) -> PathBuf {
        self.root.join(repository)
    }

    /// Create the store and clone every repository plus the monorepo.
    ///
    /// Clone failures (typically an already existing clone) are logged and
    /// skipped; the number of successful clones is returned.
    pub fn init(&self) -> Result<usize> {
        fs::create_dir_all(&self.root).map_err(|e| ReleaseError::io(&self.root, e))?;

        let mut cloned = 0;
        for repository in REPOSITORIES {
            let url = format!("git@github.com:{NAMESPACE}/{repository}.git");
            cloned += self.try_clone(&url, false);
        }
        let url = format!("git@github.com:{NAMESPACE}/{MONOREPO}.git");
        cloned += self.try_clone(&url, true);
        Ok(cloned)
    }

    fn try_clone(&self, url: &str, recurse_submodules: bool) -> usize {
        match git::clone(&self.root, url, recurse_submodules) {
            Ok(()) => {
                info!(url, "cloned");
                1
            }
            Err(e) => {
                warn!(url, error = %e, "clone failed");
                0
            }
        }
    }

    pub fn fetch(&self, repository: &str) -> Result<()> {
        git::fetch_all(&self.path(repository))
    }

    /// Abbreviated hash of `<remote>/<branch>` in a repository.
    pub fn short_ref(&self, repository: &str, branch: &str) -> Result<String> {
        let sha = git::remote_ref(&self.path(repository), &self.remote, branch)?;
        Ok(git::short(&sha).to_string())
    }

    pub fn branch_heads(&self, repository: &str) -> Result<BranchHeads> {
        Ok(BranchHeads {
            main: self.short_ref(repository, ROLLING_BRANCH)?,
            stable: self.short_ref(repository, STABLE_BRANCH)?,
        })
    }

    /// Commits that a promotion would bring to `stable`.
    pub fn pending_commits(&self, repository: &str, heads: &BranchHeads) -> Result<String> {
        git::log_graph(&self.path(repository), &heads.stable, &heads.main)
    }

    /// Point `stable` at `sha` and push it.
    pub fn move_stable(&self, repository: &str, sha: &str) -> Result<()> {
        let dir = self.path(repository);
        git::force_branch(&dir, STABLE_BRANCH, sha)?;
        git::push(&dir, &self.remote, STABLE_BRANCH)?;
        info!(repository, sha, "moved {STABLE_BRANCH}");
        Ok(())
    }

    /// Refresh the monorepo's submodule pins and push the result to `main`.
    ///
    /// With `repository` only that submodule is updated. Returns `false`
    /// when the pins were already current and nothing was committed.
    pub fn update_monorepo(&self, commit_message: &str, repository: Option<&str>) -> Result<bool> {
        let dir = self.path(MONOREPO);
        git::run(&dir, &["pull", "--recurse-submodules"])?;

        let mut update = vec!["submodule", "update", "--remote"];
        if let Some(repository) = repository {
            update.push(repository);
        }
        git::run(&dir, &update)?;

        if git::run(&dir, &["status", "--porcelain"])?.is_empty() {
            info!("monorepo references already up to date");
            return Ok(false);
        }
        git::run(&dir, &["commit", "-a", "-m", commit_message])?;
        git::push(&dir, &self.remote, ROLLING_BRANCH)?;
        Ok(true)
    }

    /// Linked changelog of merges to `main` since `since` (inclusive).
    pub fn blog_changelog(&self, repository: &str, since: NaiveDate) -> Result<String> {
        let main = self.short_ref(repository, ROLLING_BRANCH)?;
        // --since is exclusive of the given day
        let git_since = since.checked_sub_days(Days::new(1)).unwrap_or(since);
        let messages = git::merge_messages(&self.path(repository), &main, Some(git_since))?;
        Ok(changelog::render(
            messages,
            Some(&RepoLink::new(NAMESPACE, repository)),
        ))
    }

    /// Operator's login derived from the configured git e-mail.
    pub fn author(&self) -> Option<String> {
        let email = git::config_value(&self.root, "user.email")?;
        email.split('@').next().map(str::to_string)
    }
}
