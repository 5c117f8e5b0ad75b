//! Append-only failure accumulator for one test case.

use serde::Serialize;

/// Marker every build-failure line carries; later phases key off it.
pub const BUILD_FAILURE_MARKER: &str = "build was not successful";

/// Free-text failure report. Empty means the test case passed.
///
/// Lines are only ever appended; there is no way to clear or edit them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FailureReport {
    text: String,
    entries: usize,
}

impl FailureReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line (a trailing newline is added when missing).
    pub fn push(&mut self, line: impl AsRef<str>) {
        let line = line.as_ref();
        if line.is_empty() {
            return;
        }
        self.text.push_str(line);
        if !line.ends_with('\n') {
            self.text.push('\n');
        }
        self.entries += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Number of `push` calls that added text.
    pub fn entries(&self) -> usize {
        self.entries
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.text.contains(needle)
    }

    pub fn build_failed(&self) -> bool {
        self.contains(BUILD_FAILURE_MARKER)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl std::fmt::Display for FailureReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_report_means_success() {
        let report = FailureReport::new();
        assert!(report.is_empty());
        assert_eq!(report.entries(), 0);
    }

    #[test]
    fn test_push_appends_newline_once() {
        let mut report = FailureReport::new();
        report.push("first");
        report.push("second\n");
        assert_eq!(report.as_str(), "first\nsecond\n");
        assert_eq!(report.entries(), 2);
    }

    #[test]
    fn test_push_is_monotonic() {
        let mut report = FailureReport::new();
        let mut last = report.len();
        for line in ["a", "", "bb", "ccc\n"] {
            report.push(line);
            assert!(report.len() >= last);
            last = report.len();
        }
    }

    #[test]
    fn test_build_failed_marker() {
        let mut report = FailureReport::new();
        report.push("The Copr build was not successful. Copr state: failed.");
        assert!(report.build_failed());
    }
}
