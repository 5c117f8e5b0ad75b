//! Error types for client construction and the Sentry sink.
//!
//! Runtime API failures are reported through `validation_core::ForgeError`
//! and `validation_core::BuildError` so the engine can classify them.

use thiserror::Error;

/// Errors building a client from settings.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Repository is not `namespace/name`
    #[error("invalid repository {0:?}, expected namespace/name")]
    InvalidRepository(String),

    /// Token or other header value cannot be sent
    #[error("invalid header value for {0}")]
    InvalidHeader(&'static str),

    /// Base URL did not parse
    #[error("invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    /// HTTP client could not be created
    #[error("HTTP client error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Http(err.to_string())
    }
}

/// Errors forwarding a message to Sentry.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("invalid Sentry DSN: {0}")]
    InvalidDsn(String),

    #[error("Sentry request failed: {0}")]
    Request(String),

    #[error("Sentry rejected the event with HTTP {0}")]
    Rejected(u16),
}

impl From<reqwest::Error> for SinkError {
    fn from(err: reqwest::Error) -> Self {
        SinkError::Request(err.to_string())
    }
}

/// Result type for client construction.
pub type Result<T> = std::result::Result<T, ClientError>;
