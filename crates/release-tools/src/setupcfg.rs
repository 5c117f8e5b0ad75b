//! RPM requirements from a Python project's `setup.cfg`.
//!
//! Only the subset of INI needed for `[options] install_requires` is
//! understood: sections, `key = value` / `key: value` pairs, indented
//! continuation lines and full-line `#` / `;` comments.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ReleaseError, Result};

pub const OPTIONS_SECTION: &str = "options";
pub const INSTALL_REQUIRES: &str = "install_requires";

/// Parsed INI document: section -> lowercased key -> raw (multi-line) value.
#[derive(Debug, Default)]
pub struct IniDocument {
    sections: HashMap<String, HashMap<String, String>>,
}

impl IniDocument {
    pub fn parse(text: &str) -> Result<Self> {
        let mut doc = Self::default();
        let mut section: Option<String> = None;
        let mut key: Option<String> = None;

        for (idx, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }
            if trimmed.is_empty() {
                if let (Some(section), Some(key)) = (&section, &key) {
                    doc.append(section, key, "");
                }
                continue;
            }

            let continuation = line.starts_with(char::is_whitespace);
            if continuation {
                match (&section, &key) {
                    (Some(section), Some(key)) => doc.append(section, key, trimmed),
                    _ => {
                        return Err(ReleaseError::Invalid(format!(
                            "line {}: continuation without a key",
                            idx + 1
                        )))
                    }
                }
                continue;
            }

            if let Some(name) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                let name = name.trim().to_string();
                doc.sections.entry(name.clone()).or_default();
                section = Some(name);
                key = None;
                continue;
            }

            let Some(current) = &section else {
                return Err(ReleaseError::Invalid(format!(
                    "line {}: entry before any section header",
                    idx + 1
                )));
            };
            let Some(split) = trimmed.find(|c: char| c == '=' || c == ':') else {
                return Err(ReleaseError::Invalid(format!(
                    "line {}: expected `key = value`",
                    idx + 1
                )));
            };
            let name = trimmed[..split].trim().to_lowercase();
            let value = trimmed[split + 1..].trim().to_string();
            doc.sections
                .entry(current.clone())
                .or_default()
                .insert(name.clone(), value);
            key = Some(name);
        }
        Ok(doc)
    }

    fn append(&mut self, section: &str, key: &str, line: &str) {
        if let Some(value) = self
            .sections
            .get_mut(section)
            .and_then(|entries| entries.get_mut(key))
        {
            value.push('\n');
            value.push_str(line);
        }
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|entries| entries.get(&key.to_lowercase()))
            .map(String::as_str)
    }
}

/// PEP 503 normalized project name.
pub fn normalize_name(name: &str) -> String {
    static SEPARATOR_RUN: OnceLock<Option<Regex>> = OnceLock::new();
    let lowered = name.to_lowercase();
    match SEPARATOR_RUN.get_or_init(|| Regex::new(r"[-_.]+").ok()) {
        Some(re) => re.replace_all(&lowered, "-").into_owned(),
        None => lowered,
    }
}

/// Distribution name of a requirement line, without extras, version
/// specifiers or markers.
fn requirement_name(requirement: &str) -> &str {
    let end = requirement
        .find(|c: char| c.is_whitespace() || "<>=!~;[(@".contains(c))
        .unwrap_or(requirement.len());
    &requirement[..end]
}

/// `python3dist(<name>)` for every `install_requires` entry.
pub fn rpm_requirements(setup_cfg: &str) -> Result<Vec<String>> {
    let doc = IniDocument::parse(setup_cfg)?;
    let requires = doc.get(OPTIONS_SECTION, INSTALL_REQUIRES).ok_or_else(|| {
        ReleaseError::MissingKey(format!("[{OPTIONS_SECTION}] {INSTALL_REQUIRES}"))
    })?;
    Ok(requires
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| format!("python3dist({})", normalize_name(requirement_name(line))))
        .collect())
}

pub fn rpm_requirements_from_file(path: &Path) -> Result<Vec<String>> {
    let raw = fs::read_to_string(path).map_err(|e| ReleaseError::io(path, e))?;
    rpm_requirements(&raw)
}
