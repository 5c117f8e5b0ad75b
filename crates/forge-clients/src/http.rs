//! Request plumbing shared by the forge clients.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;
use validation_core::{ForgeError, ForgeResult, ValidationConfig};

use crate::error::{ClientError, Result};

pub(crate) const USER_AGENT: &str = concat!("deployment-ops/", env!("CARGO_PKG_VERSION"));

/// Longest error body kept in an error message.
const MAX_ERROR_BODY: usize = 400;

/// Limits applied to every request, so a stalled API cannot hold a
/// watcher past its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request: Duration,
    pub connect: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self::from_config(&ValidationConfig::default())
    }
}

impl HttpTimeouts {
    pub fn from_config(config: &ValidationConfig) -> Self {
        Self {
            request: config.request_timeout(),
            connect: config.connect_timeout(),
        }
    }

    pub(crate) fn builder(&self) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.request)
            .connect_timeout(self.connect)
    }

    /// Plain client for one-off downloads.
    pub fn client(&self) -> Result<reqwest::Client> {
        Ok(self.builder().build()?)
    }
}

/// JSON API bound to one forge, one base URL and one set of headers.
#[derive(Debug, Clone)]
pub(crate) struct JsonApi {
    pub(crate) http: reqwest::Client,
    base: Url,
    forge: &'static str,
}

impl JsonApi {
    pub(crate) fn new(
        forge: &'static str,
        base: &str,
        headers: HeaderMap,
        timeouts: HttpTimeouts,
    ) -> Result<Self> {
        let mut base = Url::parse(base).map_err(|e| ClientError::InvalidUrl {
            url: base.to_string(),
            message: e.to_string(),
        })?;
        // keep the last segment when joining
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = timeouts.builder().default_headers(headers).build()?;
        Ok(Self { http, base, forge })
    }

    /// URL for already-encoded path segments.
    pub(crate) fn url(&self, segments: &[&str]) -> ForgeResult<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ForgeError::InvalidPayload(format!("cannot-be-a-base URL {}", self.base)))?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    pub(crate) async fn json<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> ForgeResult<T> {
        let response = self.send(operation, request).await?;
        self.decode(operation, response).await
    }

    /// Like [`json`](Self::json) but a 404 is `None`.
    pub(crate) async fn optional<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> ForgeResult<Option<T>> {
        let response = request.send().await.map_err(|e| self.transport(e))?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(forge = self.forge, operation, "not found");
            return Ok(None);
        }
        let response = self.check(operation, response).await?;
        self.decode(operation, response).await.map(Some)
    }

    /// Fire a request whose body is irrelevant.
    pub(crate) async fn empty(&self, operation: &str, request: RequestBuilder) -> ForgeResult<()> {
        self.send(operation, request).await.map(|_| ())
    }

    async fn send(&self, operation: &str, request: RequestBuilder) -> ForgeResult<Response> {
        let response = request.send().await.map_err(|e| self.transport(e))?;
        self.check(operation, response).await
    }

    async fn check(&self, operation: &str, response: Response) -> ForgeResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ForgeError::Status {
            forge: self.forge.to_string(),
            status: status.as_u16(),
            context: format!("{operation}: {}", truncate(&body, MAX_ERROR_BODY)),
        })
    }

    async fn decode<T: DeserializeOwned>(&self, operation: &str, response: Response) -> ForgeResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| ForgeError::InvalidPayload(format!("{} {operation}: {e}", self.forge)))
    }

    fn transport(&self, err: reqwest::Error) -> ForgeError {
        ForgeError::Request {
            forge: self.forge.to_string(),
            message: err.to_string(),
        }
    }
}

pub(crate) fn header_value(name: &'static str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value.trim()).map_err(|_| ClientError::InvalidHeader(name))
}

pub(crate) fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(forge: &'static str, base: &str) -> Result<JsonApi> {
        JsonApi::new(forge, base, HeaderMap::new(), HttpTimeouts::default())
    }

    #[test]
    fn test_url_encodes_segments() {
        let api = api("Gitlab", "https://gitlab.com/api/v4").unwrap();
        let url = api
            .url(&["projects", "packit-service/hello-world", "merge_requests"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://gitlab.com/api/v4/projects/packit-service%2Fhello-world/merge_requests"
        );
    }

    #[test]
    fn test_url_keeps_trailing_base_slash() {
        let api = api("Github", "https://api.github.com/").unwrap();
        let url = api.url(&["repos", "packit", "hello-world"]).unwrap();
        assert_eq!(url.as_str(), "https://api.github.com/repos/packit/hello-world");
    }

    #[test]
    fn test_timeouts_follow_config() {
        let config = ValidationConfig {
            request_timeout_secs: 5,
            connect_timeout_secs: 2,
            ..ValidationConfig::default()
        };
        let timeouts = HttpTimeouts::from_config(&config);
        assert_eq!(timeouts.request, Duration::from_secs(5));
        assert_eq!(timeouts.connect, Duration::from_secs(2));
        assert_eq!(HttpTimeouts::default().request, Duration::from_secs(30));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééé", 3), "é");
    }

    #[test]
    fn test_invalid_base_url() {
        let err = api("Github", "not a url").unwrap_err();
        assert!(matches!(err, ClientError::InvalidUrl { .. }));
    }
}
