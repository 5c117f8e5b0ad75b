//! Copr API v3 client.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use validation_core::{Build, BuildError, BuildResult, BuildSystem};

use crate::error::{ClientError, Result};
use crate::http::HttpTimeouts;

/// Read-only Copr client.
#[derive(Debug, Clone)]
pub struct CoprClient {
    http: reqwest::Client,
    api: Url,
}

#[derive(Debug, Deserialize)]
struct BuildList {
    items: Vec<CoprBuild>,
}

#[derive(Debug, Deserialize)]
struct CoprBuild {
    id: u64,
    state: String,
}

#[derive(Debug, Deserialize)]
struct Package {
    #[serde(default)]
    builds: PackageBuilds,
}

#[derive(Debug, Default, Deserialize)]
struct PackageBuilds {
    latest_succeeded: Option<PackageBuild>,
}

#[derive(Debug, Deserialize)]
struct PackageBuild {
    source_package: Option<SourcePackage>,
}

#[derive(Debug, Deserialize)]
struct SourcePackage {
    version: Option<String>,
}

impl CoprClient {
    /// `url` is the frontend, e.g. `https://copr.fedorainfracloud.org`.
    pub fn new(url: &str) -> Result<Self> {
        Self::with_timeouts(url, HttpTimeouts::default())
    }

    pub fn with_timeouts(url: &str, timeouts: HttpTimeouts) -> Result<Self> {
        let api = Url::parse(&format!("{}/api_3/", url.trim_end_matches('/'))).map_err(|e| {
            ClientError::InvalidUrl {
                url: url.to_string(),
                message: e.to_string(),
            }
        })?;
        let http = timeouts.builder().build()?;
        Ok(Self { http, api })
    }

    fn endpoint(&self, path: &str) -> BuildResult<Url> {
        self.api
            .join(path)
            .map_err(|e| BuildError::Request(format!("invalid Copr endpoint {path}: {e}")))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> BuildResult<Option<T>> {
        let response = self
            .http
            .get(self.endpoint(path)?)
            .query(query)
            .send()
            .await
            .map_err(|e| BuildError::Request(e.to_string()))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BuildError::Request(format!(
                "Copr {path} returned HTTP {}: {}",
                status.as_u16(),
                crate::http::truncate(&body, 400)
            )));
        }
        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|e| BuildError::Request(format!("Copr {path} payload: {e}")))
    }

    /// Version of the latest succeeded build of a package, if any.
    pub async fn latest_succeeded_version(
        &self,
        owner: &str,
        project: &str,
        package: &str,
    ) -> BuildResult<Option<String>> {
        let found: Option<Package> = self
            .get(
                "package",
                &[
                    ("ownername", owner),
                    ("projectname", project),
                    ("packagename", package),
                    ("with_latest_succeeded_build", "true"),
                ],
            )
            .await?;
        let package = found.ok_or_else(|| BuildError::ProjectNotFound {
            owner: owner.to_string(),
            project: format!("{project} (package {package})"),
        })?;
        Ok(package
            .builds
            .latest_succeeded
            .and_then(|b| b.source_package)
            .and_then(|p| p.version))
    }
}

#[async_trait]
impl BuildSystem for CoprClient {
    fn name(&self) -> &str {
        "Copr"
    }

    async fn list_builds(&self, owner: &str, project: &str) -> BuildResult<Vec<Build>> {
        let list: BuildList = self
            .get(
                "build/list",
                &[("ownername", owner), ("projectname", project)],
            )
            .await?
            .ok_or_else(|| BuildError::ProjectNotFound {
                owner: owner.to_string(),
                project: project.to_string(),
            })?;
        let mut builds: Vec<Build> = list
            .items
            .into_iter()
            .map(|b| Build {
                id: b.id,
                state: b.state,
            })
            .collect();
        builds.sort_by(|a, b| b.id.cmp(&a.id));
        debug!(owner, project, count = builds.len(), "listed builds");
        Ok(builds)
    }

    async fn get_build(&self, build_id: u64) -> BuildResult<Build> {
        let build: CoprBuild = self
            .get(&format!("build/{build_id}"), &[])
            .await?
            .ok_or(BuildError::BuildNotFound(build_id))?;
        Ok(Build {
            id: build.id,
            state: build.state,
        })
    }
}
