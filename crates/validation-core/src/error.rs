//! Error taxonomy for the validation engine.
//!
//! Only setup failures travel through these types. Timeouts, rejections and
//! status anomalies are recorded in the test case's
//! [`FailureReport`](crate::FailureReport) instead.

/// Errors raised by a source-hosting backend.
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    #[error("{forge} request failed: {message}")]
    Request { forge: String, message: String },

    #[error("{forge} returned HTTP {status} for {context}")]
    Status {
        forge: String,
        status: u16,
        context: String,
    },

    #[error("not found on forge: {0}")]
    NotFound(String),

    #[error("unexpected forge payload: {0}")]
    InvalidPayload(String),
}

/// Errors raised by the build system.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The build project does not exist (yet).
    #[error("build project {owner}/{project} not found")]
    ProjectNotFound { owner: String, project: String },

    #[error("build {0} not found")]
    BuildNotFound(u64),

    #[error("build system request failed: {0}")]
    Request(String),
}

/// Fatal errors aborting a validation run.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("forge error: {0}")]
    Forge(#[from] ForgeError),

    #[error("build system error: {0}")]
    Build(#[from] BuildError),

    #[error("test case has no pull request: {0}")]
    MissingPullRequest(&'static str),

    #[error("test case has no head commit")]
    MissingHeadCommit,

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for forge operations.
pub type ForgeResult<T> = std::result::Result<T, ForgeError>;

/// Result type for build-system operations.
pub type BuildResult<T> = std::result::Result<T, BuildError>;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, ValidationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forge_status_error_display() {
        let err = ForgeError::Status {
            forge: "github".to_string(),
            status: 422,
            context: "create branch".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("github"));
        assert!(msg.contains("422"));
        assert!(msg.contains("create branch"));
    }

    #[test]
    fn test_validation_error_wraps_forge_error() {
        let err: ValidationError = ForgeError::NotFound("refs/heads/x".to_string()).into();
        assert!(err.to_string().contains("forge error"));
        assert!(err.to_string().contains("refs/heads/x"));
    }

    #[test]
    fn test_project_not_found_display() {
        let err = BuildError::ProjectNotFound {
            owner: "packit".to_string(),
            project: "packit-hello-world-1".to_string(),
        };
        assert!(err.to_string().contains("packit/packit-hello-world-1"));
    }
}
