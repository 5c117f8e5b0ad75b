//! Polling policy for the validation engine.
//!
//! The script variants this engine replaces disagreed on timeouts (15, 30
//! and 60 minutes) and on which bot comments count as a rejection, so every
//! value is configurable. Defaults follow the cron job currently deployed.
//!
//! Resolution order: built-in defaults, then an optional TOML file, then
//! `VALIDATION_*` environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

/// Timeouts, poll intervals and rejection markers, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Window for statuses to appear and leave the queued state.
    pub pending_timeout_secs: u64,
    pub pending_interval_secs: u64,

    /// Window for the build to show up in the build system.
    pub submit_timeout_secs: u64,
    pub submit_interval_secs: u64,

    /// Window for the build to reach a terminal state.
    pub build_timeout_secs: u64,
    /// Sleep after observing a new non-terminal build state.
    pub build_interval_secs: u64,
    /// Sleep after observing the same build state again.
    pub build_repeat_interval_secs: u64,

    /// Window for all statuses to complete after the build finished.
    pub completion_timeout_secs: u64,
    pub completion_interval_secs: u64,

    /// Upper bound for one API request, body included.
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,

    /// Substrings that turn a bot comment into a definitive rejection.
    pub rejection_markers: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            pending_timeout_secs: 60,
            pending_interval_secs: 5,
            submit_timeout_secs: 15 * 60,
            submit_interval_secs: 30,
            build_timeout_secs: 15 * 60,
            build_interval_secs: 30,
            build_repeat_interval_secs: 20,
            completion_timeout_secs: 20 * 60,
            completion_interval_secs: 20,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            rejection_markers: vec!["error".to_string(), "whitelist".to_string()],
        }
    }
}

impl ValidationConfig {
    /// Defaults overridden by `VALIDATION_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| ValidationError::Config(e.to_string()))
    }

    /// Override fields from `VALIDATION_*` environment variables.
    pub fn apply_env(&mut self) -> Result<()> {
        let fields: [(&str, &mut u64); 11] = [
            ("VALIDATION_PENDING_TIMEOUT_SECS", &mut self.pending_timeout_secs),
            ("VALIDATION_PENDING_INTERVAL_SECS", &mut self.pending_interval_secs),
            ("VALIDATION_SUBMIT_TIMEOUT_SECS", &mut self.submit_timeout_secs),
            ("VALIDATION_SUBMIT_INTERVAL_SECS", &mut self.submit_interval_secs),
            ("VALIDATION_BUILD_TIMEOUT_SECS", &mut self.build_timeout_secs),
            ("VALIDATION_BUILD_INTERVAL_SECS", &mut self.build_interval_secs),
            (
                "VALIDATION_BUILD_REPEAT_INTERVAL_SECS",
                &mut self.build_repeat_interval_secs,
            ),
            ("VALIDATION_COMPLETION_TIMEOUT_SECS", &mut self.completion_timeout_secs),
            ("VALIDATION_COMPLETION_INTERVAL_SECS", &mut self.completion_interval_secs),
            ("VALIDATION_REQUEST_TIMEOUT_SECS", &mut self.request_timeout_secs),
            ("VALIDATION_CONNECT_TIMEOUT_SECS", &mut self.connect_timeout_secs),
        ];
        for (name, slot) in fields {
            if let Ok(raw) = std::env::var(name) {
                *slot = raw.trim().parse().map_err(|_| {
                    ValidationError::Config(format!("{name} must be a number of seconds, got '{raw}'"))
                })?;
            }
        }
        if let Ok(raw) = std::env::var("VALIDATION_REJECTION_MARKERS") {
            self.rejection_markers = parse_markers(&raw);
        }
        self.validate()
    }

    /// Reject zero intervals and request timeouts.
    pub fn validate(&self) -> Result<()> {
        let intervals = [
            ("request_timeout_secs", self.request_timeout_secs),
            ("connect_timeout_secs", self.connect_timeout_secs),
            ("pending_interval_secs", self.pending_interval_secs),
            ("submit_interval_secs", self.submit_interval_secs),
            ("build_interval_secs", self.build_interval_secs),
            ("build_repeat_interval_secs", self.build_repeat_interval_secs),
            ("completion_interval_secs", self.completion_interval_secs),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(ValidationError::Config(format!("{name} must be positive")));
            }
        }
        Ok(())
    }

    pub fn pending_timeout(&self) -> Duration {
        Duration::from_secs(self.pending_timeout_secs)
    }

    pub fn pending_interval(&self) -> Duration {
        Duration::from_secs(self.pending_interval_secs)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    pub fn submit_interval(&self) -> Duration {
        Duration::from_secs(self.submit_interval_secs)
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    pub fn build_interval(&self) -> Duration {
        Duration::from_secs(self.build_interval_secs)
    }

    pub fn build_repeat_interval(&self) -> Duration {
        Duration::from_secs(self.build_repeat_interval_secs)
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion_timeout_secs)
    }

    pub fn completion_interval(&self) -> Duration {
        Duration::from_secs(self.completion_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Whether a bot comment is a definitive rejection.
    pub fn is_rejection(&self, comment: &str) -> bool {
        self.rejection_markers
            .iter()
            .any(|marker| !marker.is_empty() && comment.contains(marker.as_str()))
    }
}

fn parse_markers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cron_job() {
        let config = ValidationConfig::default();
        assert_eq!(config.pending_timeout(), Duration::from_secs(60));
        assert_eq!(config.submit_timeout(), Duration::from_secs(900));
        assert_eq!(config.build_timeout(), Duration::from_secs(900));
        assert_eq!(config.completion_timeout(), Duration::from_secs(1200));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_keeps_missing_defaults() {
        let config = ValidationConfig::from_toml_str(
            r#"
submit_timeout_secs = 1800
rejection_markers = ["error", "not allowed"]
"#,
        )
        .unwrap();
        assert_eq!(config.submit_timeout_secs, 1800);
        assert_eq!(config.pending_timeout_secs, 60);
        assert_eq!(config.rejection_markers.len(), 2);
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        let err = ValidationConfig::from_toml_str("submit_timeout_secs = \"soon\"").unwrap_err();
        assert!(err.to_string().contains("invalid configuration"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = ValidationConfig {
            pending_interval_secs: 0,
            ..ValidationConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ValidationConfig {
            request_timeout_secs: 0,
            ..ValidationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejection_markers() {
        let config = ValidationConfig::default();
        assert!(config.is_rejection("There was an error while submitting the build"));
        assert!(config.is_rejection("Namespace is not on our whitelist!"));
        assert!(!config.is_rejection("Build was submitted to Copr."));
    }

    #[test]
    fn test_parse_markers_trims_and_drops_empty() {
        assert_eq!(parse_markers(" error, ,denied "), vec!["error", "denied"]);
    }
}
