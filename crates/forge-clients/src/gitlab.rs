//! GitLab v4 backend: commit statuses, MR notes, merge requests, branches
//! and repository files.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::HeaderMap;
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use validation_core::{
    Comment, FileContent, ForgeError, ForgeKind, ForgeResult, PullRequest, SourceForge, Status,
    StatusState,
};

use crate::error::{ClientError, Result};
use crate::github::{COMMITTER_EMAIL, COMMITTER_NAME};
use crate::http::{header_value, HttpTimeouts, JsonApi};
use crate::settings::split_repository;

const PER_PAGE: usize = 100;

/// One GitLab project.
#[derive(Debug, Clone)]
pub struct GitLabForge {
    api: JsonApi,
    host: String,
    /// Full project path, `namespace/name`.
    path: String,
    namespace: String,
    repo: String,
}

impl GitLabForge {
    /// `instance_url` is the web URL (`https://gitlab.com`); the API lives
    /// under `/api/v4`.
    pub fn new(instance_url: &str, token: &str, repository: &str) -> Result<Self> {
        Self::with_timeouts(instance_url, token, repository, HttpTimeouts::default())
    }

    pub fn with_timeouts(
        instance_url: &str,
        token: &str,
        repository: &str,
        timeouts: HttpTimeouts,
    ) -> Result<Self> {
        let (namespace, repo) = split_repository(repository)
            .ok_or_else(|| ClientError::InvalidRepository(repository.to_string()))?;
        let instance = Url::parse(instance_url).map_err(|e| ClientError::InvalidUrl {
            url: instance_url.to_string(),
            message: e.to_string(),
        })?;
        let host = instance
            .host_str()
            .ok_or_else(|| ClientError::InvalidUrl {
                url: instance_url.to_string(),
                message: "missing host".to_string(),
            })?
            .to_string();

        let mut headers = HeaderMap::new();
        headers.insert("private-token", header_value("private-token", token)?);
        let api_base = format!("{}/api/v4", instance_url.trim_end_matches('/'));

        Ok(Self {
            api: JsonApi::new("Gitlab", &api_base, headers, timeouts)?,
            host,
            path: format!("{namespace}/{repo}"),
            namespace: namespace.to_string(),
            repo: repo.to_string(),
        })
    }

    /// Project URL; the project path is one percent-encoded segment.
    fn project_url(&self, tail: &[&str]) -> ForgeResult<Url> {
        let mut segments = vec!["projects", self.path.as_str()];
        segments.extend_from_slice(tail);
        self.api.url(&segments)
    }

    async fn paginate<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        url: Url,
        query: &[(&str, &str)],
    ) -> ForgeResult<Vec<T>> {
        let mut rows = Vec::new();
        let mut page = 1_u32;
        loop {
            let page_str = page.to_string();
            let per_page = PER_PAGE.to_string();
            let request = self
                .api
                .http
                .get(url.clone())
                .query(query)
                .query(&[("per_page", per_page.as_str()), ("page", page_str.as_str())]);
            let chunk: Vec<T> = self.api.json(operation, request).await?;
            let len = chunk.len();
            rows.extend(chunk);
            if len < PER_PAGE {
                return Ok(rows);
            }
            page = page.saturating_add(1);
        }
    }

    /// Files API writes return no commit, so read the branch head afterwards.
    async fn write_file(
        &self,
        create: bool,
        path: &str,
        branch: &str,
        message: &str,
        content: &str,
    ) -> ForgeResult<String> {
        let payload = json!({
            "branch": branch,
            "content": content,
            "commit_message": message,
            "author_name": COMMITTER_NAME,
            "author_email": COMMITTER_EMAIL,
        });
        let url = self.project_url(&["repository", "files", path])?;
        let request = if create {
            self.api.http.post(url)
        } else {
            self.api.http.put(url)
        };
        self.api.empty("write file", request.json(&payload)).await?;
        self.branch_head(branch)
            .await?
            .ok_or_else(|| ForgeError::NotFound(format!("branch {branch}")))
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CommitStatus {
    name: String,
    status: String,
    author: Author,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Author {
    username: String,
}

#[derive(Debug, Deserialize)]
struct Note {
    author: Author,
    body: String,
    #[serde(default)]
    system: bool,
}

#[derive(Debug, Deserialize)]
struct MergeRequest {
    iid: u64,
    title: String,
    web_url: String,
    source_branch: String,
    target_branch: String,
    #[serde(default)]
    sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Project {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct Branch {
    commit: BranchCommit,
}

#[derive(Debug, Deserialize)]
struct BranchCommit {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RepositoryFile {
    file_path: String,
    content: String,
    blob_id: String,
}

/// Map a commit status `status` field.
pub fn commit_status_state(status: &str) -> StatusState {
    match status {
        "created" | "waiting_for_resource" | "preparing" | "pending" | "scheduled" => {
            StatusState::Queued
        }
        "running" => StatusState::InProgress,
        "success" => StatusState::Success,
        "failed" => StatusState::Failure,
        other => StatusState::OtherTerminal(other.to_string()),
    }
}

impl MergeRequest {
    fn into_pull_request(self) -> PullRequest {
        PullRequest {
            id: self.iid,
            title: self.title,
            url: self.web_url,
            source_branch: self.source_branch,
            target_branch: self.target_branch,
            head_commit: self.sha.unwrap_or_default(),
        }
    }
}

#[async_trait]
impl SourceForge for GitLabForge {
    fn kind(&self) -> ForgeKind {
        ForgeKind::GitLab
    }

    fn repository(&self) -> String {
        self.path.clone()
    }

    fn build_project_name(&self, pr: &PullRequest) -> String {
        gitlab_project_name(&self.host, &self.namespace, &self.repo, pr.id)
    }

    async fn statuses(&self, commit: &str) -> ForgeResult<Vec<Status>> {
        let url = self.project_url(&["repository", "commits", commit, "statuses"])?;
        let rows: Vec<CommitStatus> = self.paginate("list commit statuses", url, &[]).await?;
        Ok(rows
            .into_iter()
            .map(|s| Status {
                state: commit_status_state(&s.status),
                owner: s.author.username,
                message: s.description.unwrap_or_default(),
                name: s.name,
            })
            .collect())
    }

    async fn comments(&self, pr: &PullRequest) -> ForgeResult<Vec<Comment>> {
        let url = self.project_url(&["merge_requests", &pr.id.to_string(), "notes"])?;
        let rows: Vec<Note> = self
            .paginate("list notes", url, &[("sort", "asc"), ("order_by", "created_at")])
            .await?;
        Ok(rows
            .into_iter()
            .filter(|n| !n.system)
            .map(|n| Comment {
                author: n.author.username,
                body: n.body,
            })
            .collect())
    }

    async fn post_comment(&self, pr: &PullRequest, body: &str) -> ForgeResult<()> {
        let url = self.project_url(&["merge_requests", &pr.id.to_string(), "notes"])?;
        let request = self.api.http.post(url).json(&json!({ "body": body }));
        self.api.empty("post note", request).await
    }

    async fn pull_requests(&self) -> ForgeResult<Vec<PullRequest>> {
        let url = self.project_url(&["merge_requests"])?;
        let rows: Vec<MergeRequest> = self
            .paginate("list merge requests", url, &[("state", "opened")])
            .await?;
        Ok(rows.into_iter().map(MergeRequest::into_pull_request).collect())
    }

    async fn default_branch(&self) -> ForgeResult<String> {
        let request = self.api.http.get(self.project_url(&[])?);
        let project: Project = self.api.json("get project", request).await?;
        Ok(project.default_branch)
    }

    async fn branch_head(&self, branch: &str) -> ForgeResult<Option<String>> {
        let request = self
            .api
            .http
            .get(self.project_url(&["repository", "branches", branch])?);
        let found: Option<Branch> = self.api.optional("get branch", request).await?;
        Ok(found.map(|b| b.commit.id))
    }

    async fn create_branch(&self, branch: &str, commit: &str) -> ForgeResult<()> {
        let request = self
            .api
            .http
            .post(self.project_url(&["repository", "branches"])?)
            .query(&[("branch", branch), ("ref", commit)]);
        self.api.empty("create branch", request).await
    }

    async fn delete_branch(&self, branch: &str) -> ForgeResult<()> {
        let request = self
            .api
            .http
            .delete(self.project_url(&["repository", "branches", branch])?);
        self.api.empty("delete branch", request).await
    }

    async fn read_file(&self, path: &str, branch: &str) -> ForgeResult<Option<FileContent>> {
        let request = self
            .api
            .http
            .get(self.project_url(&["repository", "files", path])?)
            .query(&[("ref", branch)]);
        let Some(file) = self
            .api
            .optional::<RepositoryFile>("read file", request)
            .await?
        else {
            return Ok(None);
        };
        let bytes = STANDARD
            .decode(file.content.trim())
            .map_err(|e| ForgeError::InvalidPayload(format!("file content is not base64: {e}")))?;
        let content = String::from_utf8(bytes)
            .map_err(|e| ForgeError::InvalidPayload(format!("file content is not UTF-8: {e}")))?;
        Ok(Some(FileContent {
            path: file.file_path,
            content,
            sha: file.blob_id,
        }))
    }

    async fn create_file(
        &self,
        path: &str,
        branch: &str,
        message: &str,
        content: &str,
    ) -> ForgeResult<String> {
        self.write_file(true, path, branch, message, content).await
    }

    async fn update_file(
        &self,
        file: &FileContent,
        branch: &str,
        message: &str,
        content: &str,
    ) -> ForgeResult<String> {
        self.write_file(false, &file.path, branch, message, content)
            .await
    }

    async fn create_pull_request(
        &self,
        title: &str,
        body: &str,
        source_branch: &str,
        target_branch: &str,
    ) -> ForgeResult<PullRequest> {
        let payload = json!({
            "title": title,
            "description": body,
            "source_branch": source_branch,
            "target_branch": target_branch,
        });
        let request = self
            .api
            .http
            .post(self.project_url(&["merge_requests"])?)
            .json(&payload);
        let mr: MergeRequest = self.api.json("create merge request", request).await?;
        let mut pr = mr.into_pull_request();
        if pr.head_commit.is_empty() {
            pr.head_commit = self.branch_head(source_branch).await?.unwrap_or_default();
        }
        Ok(pr)
    }

    async fn close_pull_request(&self, pr: &PullRequest) -> ForgeResult<()> {
        let request = self
            .api
            .http
            .put(self.project_url(&["merge_requests", &pr.id.to_string()])?)
            .json(&json!({ "state_event": "close" }));
        self.api.empty("close merge request", request).await
    }
}

/// `<host>-<namespace>-<repo>-<id>` with subgroup slashes flattened.
pub fn gitlab_project_name(host: &str, namespace: &str, repo: &str, id: u64) -> String {
    format!("{host}-{}-{repo}-{id}", namespace.replace('/', "-"))
}
