//! ACME Responder: serves one HTTP-01 challenge
//!
//! Certificate renewal jobs start the responder with the token path and the
//! key authorization it must return. `GET` on exactly that path answers
//! `200 text/plain` with the content; everything else gets
//! `404 "invalid path"`. The content never changes for the lifetime of the
//! server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{OriginalUri, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tracing::{debug, info};

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const INVALID_PATH: &str = "invalid path";

#[derive(Debug, thiserror::Error)]
pub enum AcmeError {
    #[error("challenge path must start with '/': {0}")]
    InvalidPath(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AcmeError>;

/// The one path/content pair being served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcmeChallenge {
    path: String,
    content: String,
}

impl AcmeChallenge {
    pub fn new(path: &str, content: &str) -> Result<Self> {
        if !path.starts_with('/') {
            return Err(AcmeError::InvalidPath(path.to_string()));
        }
        Ok(Self {
            path: path.to_string(),
            content: content.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

fn text(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "text/plain")], body).into_response()
}

async fn respond(
    State(challenge): State<Arc<AcmeChallenge>>,
    method: Method,
    OriginalUri(uri): OriginalUri,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return text(StatusCode::METHOD_NOT_ALLOWED, "unsupported method".to_string());
    }
    // the request target is compared verbatim, query string included
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    if target == challenge.path {
        info!(path = target, "served ACME challenge");
        text(StatusCode::OK, challenge.content.clone())
    } else {
        debug!(path = target, "rejected request");
        text(StatusCode::NOT_FOUND, INVALID_PATH.to_string())
    }
}

pub fn router(challenge: AcmeChallenge) -> Router {
    Router::new()
        .fallback(respond)
        .with_state(Arc::new(challenge))
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(bind: SocketAddr, challenge: AcmeChallenge, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|source| AcmeError::Bind { addr: bind, source })?;
    info!(%bind, path = challenge.path(), "serving ACME challenge");
    axum::serve(listener, router(challenge))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("ACME responder stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    const TOKEN_PATH: &str = "/.well-known/acme-challenge/Xk3pQ";

    async fn call(router: Router, method: Method, uri: &str) -> (StatusCode, String, String) {
        let response = router
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_default();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    fn app() -> Router {
        router(AcmeChallenge::new(TOKEN_PATH, "Xk3pQ.key-thumbprint").unwrap())
    }

    #[tokio::test]
    async fn serves_content_on_challenge_path() {
        let (status, content_type, body) = call(app(), Method::GET, TOKEN_PATH).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "text/plain");
        assert_eq!(body, "Xk3pQ.key-thumbprint");
    }

    #[tokio::test]
    async fn other_paths_are_invalid() {
        for uri in ["/", "/.well-known/acme-challenge/other", "/.well-known/acme-challenge/Xk3pQ?x=1"] {
            let (status, content_type, body) = call(app(), Method::GET, uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(content_type, "text/plain");
            assert_eq!(body, INVALID_PATH);
        }
    }

    #[tokio::test]
    async fn wrong_request_does_not_poison_later_ones() {
        let app = app();
        let (status, _, _) = call(app.clone(), Method::GET, "/favicon.ico").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, body) = call(app, Method::GET, TOKEN_PATH).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Xk3pQ.key-thumbprint");
    }

    #[tokio::test]
    async fn post_is_not_allowed() {
        let (status, _, _) = call(app(), Method::POST, TOKEN_PATH).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn relative_path_is_rejected() {
        assert!(matches!(
            AcmeChallenge::new("well-known/x", "c"),
            Err(AcmeError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown_signal() {
        let challenge = AcmeChallenge::new(TOKEN_PATH, "c").unwrap();
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        serve(addr, challenge, async {}).await.unwrap();
    }
}
