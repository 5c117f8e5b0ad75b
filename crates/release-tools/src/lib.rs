//! Release Tools: release-engineering helpers behind the ops CLI
//!
//! - `changelog`: entries from merge commit messages
//! - `promotion` / `copr_wait` / `blogpost`: the weekly `stable` branch move
//! - `webhook`: GitLab webhook tokens
//! - `setupcfg`: RPM requirements from `setup.cfg`
//! - `onboarding`: enabling Fedora CI for dist-git projects

pub mod blogpost;
pub mod changelog;
pub mod copr_wait;
mod error;
pub mod git;
pub mod onboarding;
pub mod promotion;
pub mod setupcfg;
pub mod webhook;

pub use blogpost::{format_date, format_day, BlogPost, GithubQuery};
pub use changelog::RepoLink;
pub use copr_wait::{copr_dependencies, wait_for_dependencies, CoprDependency, PackageVersions, WaitEvent};
pub use error::{ReleaseError, Result};
pub use onboarding::{PagureBz, ServiceConfigTemplate};
pub use promotion::{BranchHeads, RepoStore};
pub use webhook::{webhook_token, WebhookClaims};
