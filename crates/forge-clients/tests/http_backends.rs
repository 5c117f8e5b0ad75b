//! Backends against a local axum server standing in for the real APIs.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use forge_clients::{CoprClient, GitHubForge, GitLabForge, HttpTimeouts, SentrySink};
use serde_json::{json, Value};
use validation_core::{BuildError, BuildSystem, ErrorSink, SourceForge, StatusState};

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

// ---------------------------------------------------------------------------
// Copr
// ---------------------------------------------------------------------------

async fn copr_build_list(Query(q): Query<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
    if q.get("projectname").map(String::as_str) == Some("packit-hello-world-1") {
        (
            StatusCode::OK,
            Json(json!({ "items": [
                { "id": 3, "state": "failed" },
                { "id": 7, "state": "running" },
                { "id": 5, "state": "succeeded" },
            ]})),
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Project packit/nope does not exist." })),
        )
    }
}

async fn copr_build(Path(id): Path<u64>) -> (StatusCode, Json<Value>) {
    if id == 7 {
        (StatusCode::OK, Json(json!({ "id": 7, "state": "succeeded" })))
    } else {
        (StatusCode::NOT_FOUND, Json(json!({ "error": "no such build" })))
    }
}

async fn copr_package() -> Json<Value> {
    Json(json!({
        "name": "packit",
        "builds": { "latest_succeeded": { "source_package": { "version": "0.99.0.post1.20240305git1a2b3c4" } } }
    }))
}

fn copr_router() -> Router {
    Router::new()
        .route("/api_3/build/list", get(copr_build_list))
        .route("/api_3/build/:id", get(copr_build))
        .route("/api_3/package", get(copr_package))
}

#[tokio::test]
async fn copr_lists_builds_newest_first() {
    let addr = serve(copr_router()).await;
    let copr = CoprClient::new(&format!("http://{addr}")).unwrap();

    let builds = copr
        .list_builds("packit", "packit-hello-world-1")
        .await
        .unwrap();

    let ids: Vec<u64> = builds.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![7, 5, 3]);
}

#[tokio::test]
async fn copr_missing_project_is_distinguishable() {
    let addr = serve(copr_router()).await;
    let copr = CoprClient::new(&format!("http://{addr}")).unwrap();

    let err = copr.list_builds("packit", "nope").await.unwrap_err();
    assert!(matches!(err, BuildError::ProjectNotFound { .. }));

    let err = copr.get_build(99).await.unwrap_err();
    assert!(matches!(err, BuildError::BuildNotFound(99)));
}

#[tokio::test]
async fn copr_reads_build_and_package_version() {
    let addr = serve(copr_router()).await;
    let copr = CoprClient::new(&format!("http://{addr}")).unwrap();

    assert_eq!(copr.get_build(7).await.unwrap().state, "succeeded");
    let version = copr
        .latest_succeeded_version("packit", "packit-stable", "packit")
        .await
        .unwrap();
    assert_eq!(version.as_deref(), Some("0.99.0.post1.20240305git1a2b3c4"));
}

async fn stalled() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(3600)).await;
    Json(json!({ "items": [] }))
}

#[tokio::test]
async fn stalled_api_hits_the_request_timeout() {
    let addr = serve(Router::new().route("/api_3/build/list", get(stalled))).await;
    let timeouts = HttpTimeouts {
        request: Duration::from_millis(300),
        connect: Duration::from_secs(1),
    };
    let copr = CoprClient::with_timeouts(&format!("http://{addr}"), timeouts).unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        copr.list_builds("packit", "packit-hello-world-1"),
    )
    .await
    .expect("client kept waiting on a stalled server");

    assert!(matches!(result, Err(BuildError::Request(_))));
}

// ---------------------------------------------------------------------------
// GitHub
// ---------------------------------------------------------------------------

async fn github_check_runs(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        == Some("Bearer gh-token");
    if !authorized {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Bad credentials" })));
    }
    (
        StatusCode::OK,
        Json(json!({ "total_count": 2, "check_runs": [
            {
                "name": "rpm-build:fedora-rawhide",
                "status": "completed",
                "conclusion": "failure",
                "app": { "name": "Packit-as-a-Service" },
                "output": { "title": "RPM build failed" }
            },
            {
                "name": "testing-farm:fedora-rawhide",
                "status": "queued",
                "conclusion": null,
                "app": { "name": "Packit-as-a-Service" },
                "output": { "title": null }
            }
        ]})),
    )
}

fn github_router() -> Router {
    Router::new()
        .route(
            "/repos/packit/hello-world/commits/:sha/check-runs",
            get(github_check_runs),
        )
        .route(
            "/repos/packit/hello-world/contents/*path",
            get(|| async { (StatusCode::NOT_FOUND, Json(json!({ "message": "Not Found" }))) }),
        )
        .route(
            "/repos/packit/hello-world/git/ref/heads/*branch",
            get(|| async {
                Json(json!({ "ref": "refs/heads/main", "object": { "sha": "abc123" } }))
            }),
        )
}

#[tokio::test]
async fn github_maps_check_runs() {
    let addr = serve(github_router()).await;
    let forge =
        GitHubForge::new(&format!("http://{addr}"), "gh-token", "packit/hello-world").unwrap();

    let statuses = forge.statuses("abc123").await.unwrap();

    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses[0].state, StatusState::Failure);
    assert_eq!(statuses[0].owner, "Packit-as-a-Service");
    assert_eq!(statuses[0].message, "RPM build failed");
    assert_eq!(statuses[1].state, StatusState::Queued);
    assert_eq!(statuses[1].message, "");
}

#[tokio::test]
async fn github_bad_token_is_a_status_error() {
    let addr = serve(github_router()).await;
    let forge =
        GitHubForge::new(&format!("http://{addr}"), "wrong", "packit/hello-world").unwrap();

    let err = forge.statuses("abc123").await.unwrap_err();
    assert!(matches!(
        err,
        validation_core::ForgeError::Status { status: 401, .. }
    ));
}

#[tokio::test]
async fn github_missing_file_and_branch_lookup() {
    let addr = serve(github_router()).await;
    let forge =
        GitHubForge::new(&format!("http://{addr}"), "gh-token", "packit/hello-world").unwrap();

    assert!(forge.read_file("test.txt", "main").await.unwrap().is_none());
    assert_eq!(
        forge.branch_head("main").await.unwrap().as_deref(),
        Some("abc123")
    );
}

// ---------------------------------------------------------------------------
// GitLab
// ---------------------------------------------------------------------------

async fn gitlab_notes(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if headers.get("private-token").and_then(|v| v.to_str().ok()) != Some("gl-token") {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "401 Unauthorized" })));
    }
    (
        StatusCode::OK,
        Json(json!([
            { "author": { "username": "tester" }, "body": "/packit build", "system": false },
            { "author": { "username": "tester" }, "body": "added 1 commit", "system": true },
            { "author": { "username": "packit-as-a-service" }, "body": "Build failed", "system": false }
        ])),
    )
}

#[tokio::test]
async fn gitlab_skips_system_notes() {
    // the encoded project path arrives decoded in the route
    let router = Router::new().route(
        "/api/v4/projects/:project/merge_requests/:iid/notes",
        get(gitlab_notes),
    );
    let addr = serve(router).await;
    let forge = GitLabForge::new(
        &format!("http://{addr}"),
        "gl-token",
        "packit-service/hello-world",
    )
    .unwrap();
    let pr = validation_core::PullRequest {
        id: 4,
        title: "Basic test case: rpm build".to_string(),
        url: String::new(),
        source_branch: "rpm-build".to_string(),
        target_branch: "main".to_string(),
        head_commit: "abc".to_string(),
    };

    let comments = forge.comments(&pr).await.unwrap();

    let authors: Vec<&str> = comments.iter().map(|c| c.author.as_str()).collect();
    assert_eq!(authors, vec!["tester", "packit-as-a-service"]);
    assert_eq!(
        forge.build_project_name(&pr),
        "127.0.0.1-packit-service-hello-world-4"
    );
}

// ---------------------------------------------------------------------------
// Sentry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sentry_sink_posts_event() {
    let seen: Arc<Mutex<Vec<(String, Value)>>> = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new()
        .route(
            "/api/42/store/",
            post(
                |State(seen): State<Arc<Mutex<Vec<(String, Value)>>>>,
                 headers: HeaderMap,
                 Json(body): Json<Value>| async move {
                    let auth = headers
                        .get("x-sentry-auth")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    seen.lock().unwrap().push((auth, body));
                    Json(json!({ "id": "ok" }))
                },
            ),
        )
        .with_state(seen.clone());
    let addr = serve(router).await;

    let sink = SentrySink::new(&format!("http://public@{addr}/42"))
        .unwrap()
        .with_environment("production");
    sink.capture_message("Basic test case: rpm build failed")
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].0.contains("sentry_key=public"));
    assert_eq!(
        seen[0].1["message"]["formatted"],
        "Basic test case: rpm build failed"
    );
    assert_eq!(seen[0].1["environment"], "production");
    assert_eq!(seen[0].1["level"], "error");
}
