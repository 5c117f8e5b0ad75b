//! Minimal Sentry store-endpoint client used as the validation error sink.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Url;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;
use validation_core::ErrorSink;

use crate::error::SinkError;
use crate::http::{HttpTimeouts, USER_AGENT};

/// Parsed `https://<key>@<host>/<project>` DSN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentryDsn {
    pub public_key: String,
    pub store_url: Url,
}

impl SentryDsn {
    pub fn parse(dsn: &str) -> Result<Self, SinkError> {
        let url = Url::parse(dsn.trim()).map_err(|e| SinkError::InvalidDsn(e.to_string()))?;
        let public_key = url.username().to_string();
        if public_key.is_empty() {
            return Err(SinkError::InvalidDsn("missing public key".to_string()));
        }
        let host = url
            .host_str()
            .ok_or_else(|| SinkError::InvalidDsn("missing host".to_string()))?;

        let path = url.path().trim_matches('/');
        let (prefix, project) = match path.rsplit_once('/') {
            Some((prefix, project)) => (format!("/{prefix}"), project),
            None => (String::new(), path),
        };
        if project.is_empty() {
            return Err(SinkError::InvalidDsn("missing project id".to_string()));
        }

        let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
        let store = format!(
            "{}://{host}{port}{prefix}/api/{project}/store/",
            url.scheme()
        );
        let store_url = Url::parse(&store).map_err(|e| SinkError::InvalidDsn(e.to_string()))?;
        Ok(Self {
            public_key,
            store_url,
        })
    }

    fn auth_header(&self) -> String {
        format!(
            "Sentry sentry_version=7, sentry_client={USER_AGENT}, sentry_key={}",
            self.public_key
        )
    }
}

/// Sends each failure summary as an error-level message event.
#[derive(Debug, Clone)]
pub struct SentrySink {
    dsn: SentryDsn,
    http: reqwest::Client,
    environment: Option<String>,
}

impl SentrySink {
    pub fn new(dsn: &str) -> Result<Self, SinkError> {
        Self::with_timeouts(dsn, HttpTimeouts::default())
    }

    pub fn with_timeouts(dsn: &str, timeouts: HttpTimeouts) -> Result<Self, SinkError> {
        let http = timeouts.builder().build()?;
        Ok(Self {
            dsn: SentryDsn::parse(dsn)?,
            http,
            environment: None,
        })
    }

    /// Tag events with the deployment name.
    pub fn with_environment(mut self, environment: &str) -> Self {
        self.environment = Some(environment.to_string());
        self
    }

    pub async fn send(&self, message: &str) -> Result<Uuid, SinkError> {
        let event_id = Uuid::new_v4();
        let mut event = json!({
            "event_id": event_id.simple().to_string(),
            "timestamp": Utc::now().to_rfc3339(),
            "level": "error",
            "platform": "other",
            "logger": "validation",
            "message": { "formatted": message },
        });
        if let Some(environment) = &self.environment {
            event["environment"] = json!(environment);
        }

        let response = self
            .http
            .post(self.dsn.store_url.clone())
            .header("x-sentry-auth", self.dsn.auth_header())
            .json(&event)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Rejected(status.as_u16()));
        }
        debug!(event_id = %event_id, "sent event to Sentry");
        Ok(event_id)
    }
}

#[async_trait]
impl ErrorSink for SentrySink {
    async fn capture_message(&self, message: &str) -> anyhow::Result<()> {
        self.send(message).await?;
        Ok(())
    }
}
