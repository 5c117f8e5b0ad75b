//! Waiting for the stable Copr builds a repository depends on.
//!
//! A dependency is done once the version of its latest succeeded build in
//! `packit/packit-stable` contains the short hash of the dependency's
//! `stable` head. Pending dependencies are checked round-robin with a
//! cooldown between rounds.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use forge_clients::CoprClient;
use tracing::{debug, info};
use validation_core::Clock;

use crate::error::Result;

pub const COPR_OWNER: &str = "packit";
pub const COPR_PROJECT: &str = "packit-stable";

/// Pause between two rounds over the pending dependencies.
pub const COOLDOWN: Duration = Duration::from_secs(30);

/// A package built in the stable Copr project from one of our repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoprDependency {
    pub package: &'static str,
    pub repository: &'static str,
}

const PACKIT_DEPENDENCIES: [CoprDependency; 2] = [
    CoprDependency {
        package: "python-ogr",
        repository: "ogr",
    },
    CoprDependency {
        package: "python-specfile",
        repository: "specfile",
    },
];

const SERVICE_DEPENDENCIES: [CoprDependency; 1] = [CoprDependency {
    package: "packit",
    repository: "packit",
}];

/// Stable builds `repository` needs before its own `stable` may move.
pub fn copr_dependencies(repository: &str) -> &'static [CoprDependency] {
    match repository {
        "packit" => &PACKIT_DEPENDENCIES,
        "packit-service" => &SERVICE_DEPENDENCIES,
        _ => &[],
    }
}

/// Lookup of built package versions.
#[async_trait]
pub trait PackageVersions: Send + Sync {
    async fn latest_succeeded_version(
        &self,
        owner: &str,
        project: &str,
        package: &str,
    ) -> Result<Option<String>>;
}

#[async_trait]
impl PackageVersions for CoprClient {
    async fn latest_succeeded_version(
        &self,
        owner: &str,
        project: &str,
        package: &str,
    ) -> Result<Option<String>> {
        Ok(CoprClient::latest_succeeded_version(self, owner, project, package).await?)
    }
}

/// Progress notifications for the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitEvent {
    Checking(CoprDependency),
    Finished(CoprDependency),
    Requeued(CoprDependency),
    CoolingDown,
}

/// Block until every dependency has a stable build.
///
/// `stable_ref` yields the dependency repository's current short stable
/// hash; it is asked again on every check.
pub async fn wait_for_dependencies<F, P>(
    dependencies: &[CoprDependency],
    versions: &dyn PackageVersions,
    clock: &dyn Clock,
    mut stable_ref: F,
    mut on_event: P,
) -> Result<()>
where
    F: FnMut(&CoprDependency) -> Result<String>,
    P: FnMut(WaitEvent),
{
    if dependencies.is_empty() {
        return Ok(());
    }

    // `None` marks the end of a round
    let mut queue: VecDeque<Option<CoprDependency>> =
        dependencies.iter().copied().map(Some).collect();
    queue.push_back(None);

    while let Some(item) = queue.pop_front() {
        let Some(dependency) = item else {
            if queue.is_empty() {
                continue;
            }
            on_event(WaitEvent::CoolingDown);
            clock.sleep(COOLDOWN).await;
            queue.push_back(None);
            continue;
        };

        on_event(WaitEvent::Checking(dependency));
        let stable = stable_ref(&dependency)?;
        let built = versions
            .latest_succeeded_version(COPR_OWNER, COPR_PROJECT, dependency.package)
            .await?;
        debug!(package = dependency.package, %stable, ?built, "checked stable build");

        if built.is_some_and(|version| version.contains(&stable)) {
            info!(package = dependency.package, "stable build finished");
            on_event(WaitEvent::Finished(dependency));
        } else {
            on_event(WaitEvent::Requeued(dependency));
            queue.push_back(Some(dependency));
        }
    }
    Ok(())
}
