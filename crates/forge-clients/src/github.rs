//! GitHub REST backend: check runs, issue comments, pull requests, git refs
//! and the contents API.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use validation_core::{
    Comment, FileContent, ForgeError, ForgeKind, ForgeResult, PullRequest, SourceForge, Status,
    StatusState,
};

use crate::error::{ClientError, Result};
use crate::http::{header_value, HttpTimeouts, JsonApi};
use crate::settings::split_repository;

const API_VERSION: &str = "2022-11-28";
const PER_PAGE: usize = 100;

/// Identity used for the commits the triggers create.
pub const COMMITTER_NAME: &str = "Release Bot";
pub const COMMITTER_EMAIL: &str = "user-cont-team+release-bot@redhat.com";

/// One GitHub repository.
#[derive(Debug, Clone)]
pub struct GitHubForge {
    api: JsonApi,
    namespace: String,
    repo: String,
}

impl GitHubForge {
    pub fn new(api_url: &str, token: &str, repository: &str) -> Result<Self> {
        Self::with_timeouts(api_url, token, repository, HttpTimeouts::default())
    }

    pub fn with_timeouts(
        api_url: &str,
        token: &str,
        repository: &str,
        timeouts: HttpTimeouts,
    ) -> Result<Self> {
        let (namespace, repo) = split_repository(repository)
            .ok_or_else(|| ClientError::InvalidRepository(repository.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, header_value("accept", "application/vnd.github+json")?);
        headers.insert("x-github-api-version", header_value("api version", API_VERSION)?);
        headers.insert(
            AUTHORIZATION,
            header_value("authorization", &format!("Bearer {}", token.trim()))?,
        );

        Ok(Self {
            api: JsonApi::new("Github", api_url, headers, timeouts)?,
            namespace: namespace.to_string(),
            repo: repo.to_string(),
        })
    }

    fn repo_url(&self, tail: &[&str]) -> ForgeResult<reqwest::Url> {
        let mut segments = vec!["repos", self.namespace.as_str(), self.repo.as_str()];
        segments.extend_from_slice(tail);
        self.api.url(&segments)
    }

    /// Contents API URL; file paths keep their slashes.
    fn contents_url(&self, path: &str) -> ForgeResult<reqwest::Url> {
        let mut tail = vec!["contents"];
        tail.extend(path.split('/').filter(|s| !s.is_empty()));
        self.repo_url(&tail)
    }

    async fn paginate<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        url: reqwest::Url,
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

    fn committer() -> serde_json::Value {
        json!({ "name": COMMITTER_NAME, "email": COMMITTER_EMAIL })
    }

    async fn put_contents(
        &self,
        path: &str,
        branch: &str,
        message: &str,
        content: &str,
        sha: Option<&str>,
    ) -> ForgeResult<String> {
        let mut payload = json!({
            "message": message,
            "content": STANDARD.encode(content),
            "branch": branch,
            "committer": Self::committer(),
            "author": Self::committer(),
        });
        if let Some(sha) = sha {
            payload["sha"] = json!(sha);
        }
        let request = self.api.http.put(self.contents_url(path)?).json(&payload);
        let response: ContentsWrite = self.api.json("write file", request).await?;
        Ok(response.commit.sha)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CheckRuns {
    check_runs: Vec<CheckRun>,
}

#[derive(Debug, Deserialize)]
struct CheckRun {
    name: String,
    status: String,
    conclusion: Option<String>,
    app: Option<App>,
    #[serde(default)]
    output: Option<CheckOutput>,
}

#[derive(Debug, Deserialize)]
struct App {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CheckOutput {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IssueComment {
    user: User,
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct User {
    login: String,
}

#[derive(Debug, Deserialize)]
struct Pull {
    number: u64,
    title: String,
    html_url: String,
    head: GitRef,
    base: GitRef,
}

#[derive(Debug, Deserialize)]
struct GitRef {
    #[serde(rename = "ref")]
    name: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct Repository {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct Reference {
    object: RefObject,
}

#[derive(Debug, Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct Contents {
    path: String,
    sha: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ContentsWrite {
    commit: RefObject,
}

impl From<Pull> for PullRequest {
    fn from(pull: Pull) -> Self {
        PullRequest {
            id: pull.number,
            title: pull.title,
            url: pull.html_url,
            source_branch: pull.head.name,
            target_branch: pull.base.name,
            head_commit: pull.head.sha,
        }
    }
}

/// Map a check run's `status`/`conclusion` pair.
pub fn check_run_state(status: &str, conclusion: Option<&str>) -> StatusState {
    match status {
        "completed" => match conclusion {
            Some("success") => StatusState::Success,
            Some("failure") => StatusState::Failure,
            Some(other) => StatusState::OtherTerminal(other.to_string()),
            None => StatusState::OtherTerminal("unknown".to_string()),
        },
        "in_progress" => StatusState::InProgress,
        _ => StatusState::Queued,
    }
}

fn decode_content(raw: &str) -> ForgeResult<String> {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(cleaned)
        .map_err(|e| ForgeError::InvalidPayload(format!("file content is not base64: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| ForgeError::InvalidPayload(format!("file content is not UTF-8: {e}")))
}

#[async_trait]
impl SourceForge for GitHubForge {
    fn kind(&self) -> ForgeKind {
        ForgeKind::GitHub
    }

    fn repository(&self) -> String {
        format!("{}/{}", self.namespace, self.repo)
    }

    fn build_project_name(&self, pr: &PullRequest) -> String {
        format!("{}-{}-{}", self.namespace, self.repo, pr.id)
    }

    async fn statuses(&self, commit: &str) -> ForgeResult<Vec<Status>> {
        let url = self.repo_url(&["commits", commit, "check-runs"])?;
        let per_page = PER_PAGE.to_string();
        let request = self
            .api
            .http
            .get(url)
            .query(&[("per_page", per_page.as_str())]);
        let runs: CheckRuns = self.api.json("list check runs", request).await?;
        Ok(runs
            .check_runs
            .into_iter()
            .map(|run| Status {
                state: check_run_state(&run.status, run.conclusion.as_deref()),
                owner: run.app.map(|a| a.name).unwrap_or_default(),
                message: run.output.and_then(|o| o.title).unwrap_or_default(),
                name: run.name,
            })
            .collect())
    }

    async fn comments(&self, pr: &PullRequest) -> ForgeResult<Vec<Comment>> {
        let url = self.repo_url(&["issues", &pr.id.to_string(), "comments"])?;
        let rows: Vec<IssueComment> = self
            .paginate("list comments", url, &[("sort", "created"), ("direction", "asc")])
            .await?;
        Ok(rows
            .into_iter()
            .map(|c| Comment {
                author: c.user.login,
                body: c.body.unwrap_or_default(),
            })
            .collect())
    }

    async fn post_comment(&self, pr: &PullRequest, body: &str) -> ForgeResult<()> {
        let url = self.repo_url(&["issues", &pr.id.to_string(), "comments"])?;
        let request = self.api.http.post(url).json(&json!({ "body": body }));
        self.api.empty("post comment", request).await
    }

    async fn pull_requests(&self) -> ForgeResult<Vec<PullRequest>> {
        let url = self.repo_url(&["pulls"])?;
        let rows: Vec<Pull> = self
            .paginate("list pull requests", url, &[("state", "open")])
            .await?;
        Ok(rows.into_iter().map(PullRequest::from).collect())
    }

    async fn default_branch(&self) -> ForgeResult<String> {
        let request = self.api.http.get(self.repo_url(&[])?);
        let repo: Repository = self.api.json("get repository", request).await?;
        Ok(repo.default_branch)
    }

    async fn branch_head(&self, branch: &str) -> ForgeResult<Option<String>> {
        let mut tail = vec!["git", "ref", "heads"];
        tail.extend(branch.split('/'));
        let request = self.api.http.get(self.repo_url(&tail)?);
        let reference: Option<Reference> = self.api.optional("get branch", request).await?;
        Ok(reference.map(|r| r.object.sha))
    }

    async fn create_branch(&self, branch: &str, commit: &str) -> ForgeResult<()> {
        let payload = json!({ "ref": format!("refs/heads/{branch}"), "sha": commit });
        let request = self
            .api
            .http
            .post(self.repo_url(&["git", "refs"])?)
            .json(&payload);
        self.api.empty("create branch", request).await
    }

    async fn delete_branch(&self, branch: &str) -> ForgeResult<()> {
        let mut tail = vec!["git", "refs", "heads"];
        tail.extend(branch.split('/'));
        let request = self.api.http.delete(self.repo_url(&tail)?);
        self.api.empty("delete branch", request).await
    }

    async fn read_file(&self, path: &str, branch: &str) -> ForgeResult<Option<FileContent>> {
        let request = self
            .api
            .http
            .get(self.contents_url(path)?)
            .query(&[("ref", branch)]);
        let Some(contents) = self
            .api
            .optional::<Contents>("read file", request)
            .await?
        else {
            return Ok(None);
        };
        Ok(Some(FileContent {
            content: decode_content(&contents.content)?,
            path: contents.path,
            sha: contents.sha,
        }))
    }

    async fn create_file(
        &self,
        path: &str,
        branch: &str,
        message: &str,
        content: &str,
    ) -> ForgeResult<String> {
        self.put_contents(path, branch, message, content, None).await
    }

    async fn update_file(
        &self,
        file: &FileContent,
        branch: &str,
        message: &str,
        content: &str,
    ) -> ForgeResult<String> {
        self.put_contents(&file.path, branch, message, content, Some(&file.sha))
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
            "body": body,
            "head": source_branch,
            "base": target_branch,
        });
        let request = self.api.http.post(self.repo_url(&["pulls"])?).json(&payload);
        let pull: Pull = self.api.json("create pull request", request).await?;
        debug!(number = pull.number, "created pull request");
        Ok(pull.into())
    }

    async fn close_pull_request(&self, pr: &PullRequest) -> ForgeResult<()> {
        let request = self
            .api
            .http
            .patch(self.repo_url(&["pulls", &pr.id.to_string()])?)
            .json(&json!({ "state": "closed" }));
        self.api.empty("close pull request", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_run_state_mapping() {
        assert_eq!(check_run_state("queued", None), StatusState::Queued);
        assert_eq!(check_run_state("requested", None), StatusState::Queued);
        assert_eq!(check_run_state("in_progress", None), StatusState::InProgress);
        assert_eq!(
            check_run_state("completed", Some("success")),
            StatusState::Success
        );
        assert_eq!(
            check_run_state("completed", Some("failure")),
            StatusState::Failure
        );
        assert_eq!(
            check_run_state("completed", Some("neutral")),
            StatusState::OtherTerminal("neutral".to_string())
        );
    }

    #[test]
    fn test_decode_content_with_line_breaks() {
        let encoded = "LS0tCmpvYnM6\nIFtdCg==\n";
        assert_eq!(decode_content(encoded).unwrap(), "---\njobs: []\n");
    }

    #[test]
    fn test_project_name_and_repository() {
        let forge = GitHubForge::new("https://api.github.com", "token", "packit/hello-world")
            .unwrap();
        let pr = PullRequest {
            id: 42,
            title: String::new(),
            url: String::new(),
            source_branch: String::new(),
            target_branch: String::new(),
            head_commit: String::new(),
        };
        assert_eq!(forge.repository(), "packit/hello-world");
        assert_eq!(forge.build_project_name(&pr), "packit-hello-world-42");
    }

    #[test]
    fn test_invalid_repository() {
        let err = GitHubForge::new("https://api.github.com", "token", "hello-world").unwrap_err();
        assert!(matches!(err, ClientError::InvalidRepository(_)));
    }

    #[test]
    fn test_contents_url_keeps_path_slashes() {
        let forge = GitHubForge::new("https://api.github.com", "token", "packit/hello-world")
            .unwrap();
        assert_eq!(
            forge.contents_url("docs/index.md").unwrap().as_str(),
            "https://api.github.com/repos/packit/hello-world/contents/docs/index.md"
        );
    }
}
