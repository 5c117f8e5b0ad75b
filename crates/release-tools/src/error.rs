use std::path::PathBuf;

use validation_core::BuildError;

/// Errors raised by the release tooling.
#[derive(Debug, thiserror::Error)]
pub enum ReleaseError {
    #[error("git {command} failed: {message}")]
    Git { command: String, message: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("token signing failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Copr lookup failed: {0}")]
    Copr(#[from] BuildError),

    #[error("missing key `{0}`")]
    MissingKey(String),

    #[error("{0}")]
    Invalid(String),
}

impl ReleaseError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReleaseError>;
