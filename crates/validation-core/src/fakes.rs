//! In-memory fakes for the engine's collaborators (testing only)
//!
//! Provides `FakeClock`, `MemoryForge`, `ScriptedBuildSystem` and
//! `RecordingSink`. Forge statuses and build listings are scripted against
//! the fake clock's elapsed time, so a whole validation run can be replayed
//! without any real waiting.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::clock::Clock;
use crate::error::{BuildError, BuildResult, ForgeError, ForgeResult};
use crate::model::{Build, Comment, FileContent, ForgeKind, PullRequest, Status};
use crate::traits::{BuildSystem, ErrorSink, SourceForge};

// ---------------------------------------------------------------------------
// FakeClock
// ---------------------------------------------------------------------------

/// Clock that only moves when something sleeps on it.
#[derive(Debug)]
pub struct FakeClock {
    start: DateTime<Utc>,
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeClock {
    /// Starts at 2024-03-05 12:00:00 UTC.
    pub fn new() -> Self {
        let start = Utc
            .with_ymd_and_hms(2024, 3, 5, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self {
            start,
            now: Mutex::new(start),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Time slept since creation.
    pub fn elapsed(&self) -> Duration {
        let now = *self.now.lock().unwrap();
        (now - self.start).to_std().unwrap_or(Duration::ZERO)
    }

    /// Every sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.advance(duration);
    }
}

/// Values that change at fixed offsets from the clock's start.
#[derive(Debug, Clone)]
pub struct Timeline<T> {
    steps: Vec<(Duration, T)>,
}

impl<T: Clone> Timeline<T> {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// From `offset` on (until the next step), the value is `value`.
    pub fn at(mut self, offset: Duration, value: T) -> Self {
        self.steps.push((offset, value));
        self.steps.sort_by_key(|(offset, _)| *offset);
        self
    }

    pub fn value_at(&self, elapsed: Duration) -> Option<T> {
        self.steps
            .iter()
            .rev()
            .find(|(offset, _)| *offset <= elapsed)
            .map(|(_, value)| value.clone())
    }
}

impl<T: Clone> Default for Timeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// MemoryForge
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ForgeState {
    branches: BTreeMap<String, String>,
    files: HashMap<(String, String), String>,
    pulls: Vec<(PullRequest, bool)>,
    comments: HashMap<u64, Vec<Comment>>,
    next_commit: u64,
    next_pr: u64,
    calls: Vec<String>,
}

impl ForgeState {
    fn commit(&mut self, branch: &str) -> String {
        self.next_commit += 1;
        let sha = format!("{:040x}", self.next_commit);
        self.branches.insert(branch.to_string(), sha.clone());
        sha
    }
}

/// In-memory repository implementing `SourceForge`.
#[derive(Debug)]
pub struct MemoryForge {
    kind: ForgeKind,
    clock: Arc<FakeClock>,
    state: Mutex<ForgeState>,
    statuses: Mutex<Timeline<Vec<Status>>>,
    /// Comment the bot posts whenever anyone comments.
    bot_reply: Mutex<Option<Comment>>,
    fail_statuses: Mutex<bool>,
}

impl MemoryForge {
    /// Repository `packit/hello-world` with a `main` branch holding `.packit.yaml`.
    pub fn new(kind: ForgeKind, clock: Arc<FakeClock>) -> Self {
        let mut state = ForgeState {
            next_pr: 1,
            ..ForgeState::default()
        };
        state.commit("main");
        state.files.insert(
            ("main".to_string(), ".packit.yaml".to_string()),
            "---\njobs:\n  - job: copr_build\n".to_string(),
        );
        Self {
            kind,
            clock,
            state: Mutex::new(state),
            statuses: Mutex::new(Timeline::new()),
            bot_reply: Mutex::new(None),
            fail_statuses: Mutex::new(false),
        }
    }

    /// Script the statuses returned for every commit.
    pub fn script_statuses(&self, timeline: Timeline<Vec<Status>>) {
        *self.statuses.lock().unwrap() = timeline;
    }

    pub fn reply_with(&self, comment: Comment) {
        *self.bot_reply.lock().unwrap() = Some(comment);
    }

    /// Make every `statuses` call fail.
    pub fn fail_statuses(&self, fail: bool) {
        *self.fail_statuses.lock().unwrap() = fail;
    }

    /// Add an open PR backed by a branch with a placeholder file.
    pub fn add_pull_request(&self, title: &str, branch: &str) -> PullRequest {
        let mut state = self.state.lock().unwrap();
        let head = state.commit(branch);
        state.files.insert(
            (branch.to_string(), "test.txt".to_string()),
            "Testing the push trigger.".to_string(),
        );
        let pr = PullRequest {
            id: state.next_pr,
            title: title.to_string(),
            url: format!("https://forge.test/packit/hello-world/pull/{}", state.next_pr),
            source_branch: branch.to_string(),
            target_branch: "main".to_string(),
            head_commit: head,
        };
        state.next_pr += 1;
        state.pulls.push((pr.clone(), true));
        pr
    }

    pub fn add_comment(&self, pr_id: u64, author: &str, body: &str) {
        let mut state = self.state.lock().unwrap();
        state.comments.entry(pr_id).or_default().push(Comment {
            author: author.to_string(),
            body: body.to_string(),
        });
    }

    pub fn comments_on(&self, pr_id: u64) -> Vec<Comment> {
        let state = self.state.lock().unwrap();
        state.comments.get(&pr_id).cloned().unwrap_or_default()
    }

    pub fn is_open(&self, pr_id: u64) -> bool {
        let state = self.state.lock().unwrap();
        state
            .pulls
            .iter()
            .any(|(pr, open)| pr.id == pr_id && *open)
    }

    pub fn has_branch(&self, branch: &str) -> bool {
        self.state.lock().unwrap().branches.contains_key(branch)
    }

    pub fn file(&self, branch: &str, path: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .files
            .get(&(branch.to_string(), path.to_string()))
            .cloned()
    }

    /// Names of the trait methods called so far.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn record(&self, call: &str) {
        self.state.lock().unwrap().calls.push(call.to_string());
    }
}

#[async_trait]
impl SourceForge for MemoryForge {
    fn kind(&self) -> ForgeKind {
        self.kind
    }

    fn repository(&self) -> String {
        "packit/hello-world".to_string()
    }

    fn build_project_name(&self, pr: &PullRequest) -> String {
        format!("packit-hello-world-{}", pr.id)
    }

    async fn statuses(&self, _commit: &str) -> ForgeResult<Vec<Status>> {
        self.record("statuses");
        if *self.fail_statuses.lock().unwrap() {
            return Err(ForgeError::Request {
                forge: "memory".to_string(),
                message: "statuses unavailable".to_string(),
            });
        }
        let timeline = self.statuses.lock().unwrap();
        Ok(timeline.value_at(self.clock.elapsed()).unwrap_or_default())
    }

    async fn comments(&self, pr: &PullRequest) -> ForgeResult<Vec<Comment>> {
        self.record("comments");
        Ok(self.comments_on(pr.id))
    }

    async fn post_comment(&self, pr: &PullRequest, body: &str) -> ForgeResult<()> {
        self.record("post_comment");
        self.add_comment(pr.id, "validation-bot", body);
        let reply = self.bot_reply.lock().unwrap().clone();
        if let Some(reply) = reply {
            self.add_comment(pr.id, &reply.author, &reply.body);
        }
        Ok(())
    }

    async fn pull_requests(&self) -> ForgeResult<Vec<PullRequest>> {
        self.record("pull_requests");
        let state = self.state.lock().unwrap();
        Ok(state
            .pulls
            .iter()
            .filter(|(_, open)| *open)
            .map(|(pr, _)| pr.clone())
            .collect())
    }

    async fn default_branch(&self) -> ForgeResult<String> {
        self.record("default_branch");
        Ok("main".to_string())
    }

    async fn branch_head(&self, branch: &str) -> ForgeResult<Option<String>> {
        self.record("branch_head");
        Ok(self.state.lock().unwrap().branches.get(branch).cloned())
    }

    async fn create_branch(&self, branch: &str, commit: &str) -> ForgeResult<()> {
        self.record("create_branch");
        let mut state = self.state.lock().unwrap();
        if state.branches.contains_key(branch) {
            return Err(ForgeError::Status {
                forge: "memory".to_string(),
                status: 422,
                context: format!("branch {branch} already exists"),
            });
        }
        let source = state
            .branches
            .iter()
            .find(|(_, sha)| sha.as_str() == commit)
            .map(|(name, _)| name.clone());
        state.branches.insert(branch.to_string(), commit.to_string());
        if let Some(source) = source {
            let copied: Vec<(String, String)> = state
                .files
                .iter()
                .filter(|((b, _), _)| *b == source)
                .map(|((_, path), content)| (path.clone(), content.clone()))
                .collect();
            for (path, content) in copied {
                state.files.insert((branch.to_string(), path), content);
            }
        }
        Ok(())
    }

    async fn delete_branch(&self, branch: &str) -> ForgeResult<()> {
        self.record("delete_branch");
        let mut state = self.state.lock().unwrap();
        state
            .branches
            .remove(branch)
            .ok_or_else(|| ForgeError::NotFound(format!("branch {branch}")))?;
        state.files.retain(|(b, _), _| b != branch);
        Ok(())
    }

    async fn read_file(&self, path: &str, branch: &str) -> ForgeResult<Option<FileContent>> {
        self.record("read_file");
        let state = self.state.lock().unwrap();
        Ok(state
            .files
            .get(&(branch.to_string(), path.to_string()))
            .map(|content| FileContent {
                path: path.to_string(),
                content: content.clone(),
                sha: format!("blob-{}", content.len()),
            }))
    }

    async fn create_file(
        &self,
        path: &str,
        branch: &str,
        _message: &str,
        content: &str,
    ) -> ForgeResult<String> {
        self.record("create_file");
        let mut state = self.state.lock().unwrap();
        if !state.branches.contains_key(branch) {
            return Err(ForgeError::NotFound(format!("branch {branch}")));
        }
        state
            .files
            .insert((branch.to_string(), path.to_string()), content.to_string());
        Ok(state.commit(branch))
    }

    async fn update_file(
        &self,
        file: &FileContent,
        branch: &str,
        _message: &str,
        content: &str,
    ) -> ForgeResult<String> {
        self.record("update_file");
        let mut state = self.state.lock().unwrap();
        let key = (branch.to_string(), file.path.clone());
        if !state.files.contains_key(&key) {
            return Err(ForgeError::NotFound(format!("{} on {branch}", file.path)));
        }
        state.files.insert(key, content.to_string());
        let sha = state.commit(branch);
        for (pr, _) in state.pulls.iter_mut() {
            if pr.source_branch == branch {
                pr.head_commit = sha.clone();
            }
        }
        Ok(sha)
    }

    async fn create_pull_request(
        &self,
        title: &str,
        _body: &str,
        source_branch: &str,
        target_branch: &str,
    ) -> ForgeResult<PullRequest> {
        self.record("create_pull_request");
        let mut state = self.state.lock().unwrap();
        let head_commit = state
            .branches
            .get(source_branch)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(format!("branch {source_branch}")))?;
        let pr = PullRequest {
            id: state.next_pr,
            title: title.to_string(),
            url: format!("https://forge.test/packit/hello-world/pull/{}", state.next_pr),
            source_branch: source_branch.to_string(),
            target_branch: target_branch.to_string(),
            head_commit,
        };
        state.next_pr += 1;
        state.pulls.push((pr.clone(), true));
        Ok(pr)
    }

    async fn close_pull_request(&self, pr: &PullRequest) -> ForgeResult<()> {
        self.record("close_pull_request");
        let mut state = self.state.lock().unwrap();
        for (existing, open) in state.pulls.iter_mut() {
            if existing.id == pr.id {
                *open = false;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedBuildSystem
// ---------------------------------------------------------------------------

/// Build system whose listings follow a timeline and whose build states are
/// consumed one per `get_build` call (the last state repeats).
#[derive(Debug)]
pub struct ScriptedBuildSystem {
    clock: Arc<FakeClock>,
    builds: Mutex<Timeline<Vec<Build>>>,
    states: Mutex<HashMap<u64, VecDeque<String>>>,
    missing_project_until: Mutex<Option<Duration>>,
    get_calls: Mutex<usize>,
}

impl ScriptedBuildSystem {
    pub fn new(clock: Arc<FakeClock>) -> Self {
        Self {
            clock,
            builds: Mutex::new(Timeline::new()),
            states: Mutex::new(HashMap::new()),
            missing_project_until: Mutex::new(None),
            get_calls: Mutex::new(0),
        }
    }

    /// Script the listing (newest first) for every project.
    pub fn script_builds(&self, timeline: Timeline<Vec<Build>>) {
        *self.builds.lock().unwrap() = timeline;
    }

    /// States returned by successive `get_build(id)` calls.
    pub fn script_states(&self, build_id: u64, states: &[&str]) {
        self.states.lock().unwrap().insert(
            build_id,
            states.iter().map(|s| s.to_string()).collect(),
        );
    }

    /// Listing fails with `ProjectNotFound` until `elapsed >= until`.
    pub fn missing_project_until(&self, until: Duration) {
        *self.missing_project_until.lock().unwrap() = Some(until);
    }

    pub fn get_calls(&self) -> usize {
        *self.get_calls.lock().unwrap()
    }
}

#[async_trait]
impl BuildSystem for ScriptedBuildSystem {
    fn name(&self) -> &str {
        "Copr"
    }

    async fn list_builds(&self, owner: &str, project: &str) -> BuildResult<Vec<Build>> {
        let elapsed = self.clock.elapsed();
        if let Some(until) = *self.missing_project_until.lock().unwrap() {
            if elapsed < until {
                return Err(BuildError::ProjectNotFound {
                    owner: owner.to_string(),
                    project: project.to_string(),
                });
            }
        }
        Ok(self
            .builds
            .lock()
            .unwrap()
            .value_at(elapsed)
            .unwrap_or_default())
    }

    async fn get_build(&self, build_id: u64) -> BuildResult<Build> {
        *self.get_calls.lock().unwrap() += 1;
        let mut states = self.states.lock().unwrap();
        let queue = states
            .get_mut(&build_id)
            .ok_or(BuildError::BuildNotFound(build_id))?;
        let state = if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        };
        Ok(Build { id: build_id, state })
    }
}

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

/// Error sink that keeps every captured message.
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl ErrorSink for RecordingSink {
    async fn capture_message(&self, message: &str) -> anyhow::Result<()> {
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}
