//! Fedora CI onboarding: adding dist-git projects to the production
//! service configuration.
//!
//! The configuration is a Jinja template whose first [`SKIP_JINJA_LINES`]
//! lines are template logic. The YAML below them is only parsed to read the
//! current project list; writing touches nothing but the lines of that list,
//! so comments, anchors and templated values elsewhere survive.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::ops::Range;
use std::path::Path;

use serde::Deserialize;
use serde_yaml::Value;
use tracing::info;

use crate::error::{ReleaseError, Result};

pub const SKIP_JINJA_LINES: usize = 32;
pub const DEFAULT_SERVICE_CONFIG: &str = "secrets/packit/prod/packit-service.yaml.j2";
pub const FEDORA_CI_KEY: &str = "enabled_projects_for_fedora_ci";
pub const DIST_GIT_PREFIX: &str = "https://src.fedoraproject.org/rpms/";
pub const PAGURE_BZ_URL: &str = "https://src.fedoraproject.org/extras/pagure_bz.json";
pub const ZUUL_DISTGITS_URL: &str =
    "https://pagure.io/fedora-project-config/raw/master/f/resources/fedora-distgits.yaml";

const DEFAULT_ITEM_INDENT: &str = "  ";

pub fn dist_git_url(package: &str) -> String {
    format!("{DIST_GIT_PREFIX}{package}")
}

/// The production service configuration template.
#[derive(Debug, Clone)]
pub struct ServiceConfigTemplate {
    header: String,
    body: String,
    projects: Vec<String>,
}

impl ServiceConfigTemplate {
    pub fn parse(text: &str) -> Result<Self> {
        let mut header_len = 0;
        for (count, line) in text.split_inclusive('\n').enumerate() {
            if count == SKIP_JINJA_LINES {
                break;
            }
            header_len += line.len();
        }
        if text[..header_len].matches('\n').count() < SKIP_JINJA_LINES {
            return Err(ReleaseError::Invalid(format!(
                "service config is shorter than the {SKIP_JINJA_LINES}-line template header"
            )));
        }

        let (header, body) = text.split_at(header_len);
        let projects = match serde_yaml::from_str::<Value>(body)? {
            Value::Mapping(mapping) => mapping
                .get(FEDORA_CI_KEY)
                .and_then(Value::as_sequence)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            Value::Null => Vec::new(),
            _ => {
                return Err(ReleaseError::Invalid(
                    "service config body is not a mapping".to_string(),
                ))
            }
        };
        Ok(Self {
            header: header.to_string(),
            body: body.to_string(),
            projects,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| ReleaseError::io(path, e))?;
        Self::parse(&raw)
    }

    pub fn render(&self) -> String {
        format!("{}{}", self.header, self.body)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render()).map_err(|e| ReleaseError::io(path, e))
    }

    pub fn fedora_ci_projects(&self) -> Vec<String> {
        self.projects.clone()
    }

    /// Enable Fedora CI for the given packages; returns how many were new.
    /// The project list is written back sorted.
    pub fn enroll<I, S>(&mut self, packages: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let previous = self.projects.len();
        for package in packages {
            let url = dist_git_url(package.as_ref());
            if !self.projects.contains(&url) {
                self.projects.push(url);
            }
        }
        let added = self.projects.len() - previous;
        self.projects.sort();
        if !self.projects.is_empty() {
            self.body = rewrite_project_list(&self.body, &self.projects);
        }
        info!(added, "enrolled Fedora CI projects");
        added
    }
}

/// Where the project list sits in the YAML body.
#[derive(Debug, PartialEq, Eq)]
struct ListSpan {
    /// Byte range replaced when the list is written.
    range: Range<usize>,
    /// Key line written in front of the items, set when the span starts at
    /// the key itself.
    key_line: Option<String>,
    item_indent: String,
}

/// Locate the item lines of the top-level project list. For a block
/// sequence the key line and anything before the first item are left out
/// of the span, as are comments and blank lines after the last item.
fn find_project_list(body: &str) -> Option<ListSpan> {
    let mut offset = 0;
    let mut lines = body.split_inclusive('\n');
    let (key_start, key) = loop {
        let line = lines.next()?;
        let start = offset;
        offset += line.len();
        let is_key = line
            .strip_prefix(FEDORA_CI_KEY)
            .is_some_and(|rest| rest.trim_start().starts_with(':'));
        if is_key {
            break (start, line);
        }
    };

    let value = key
        .split_once(':')
        .map(|(_, value)| strip_comment(value).trim())
        .unwrap_or_default();
    if !value.is_empty() {
        // Flow sequence, possibly spread over several lines.
        let mut end = offset;
        if value.starts_with('[') && !value.contains(']') {
            for line in lines {
                end += line.len();
                if strip_comment(line).contains(']') {
                    break;
                }
            }
        }
        return Some(ListSpan {
            range: key_start..end,
            key_line: Some(format!("{FEDORA_CI_KEY}:\n")),
            item_indent: DEFAULT_ITEM_INDENT.to_string(),
        });
    }

    let after_key = offset;
    let mut first_item: Option<(usize, String)> = None;
    let mut end = offset;
    for line in lines {
        let start = offset;
        offset += line.len();
        let content = line.trim_start();
        let indent = &line[..line.len() - content.len()];
        if content.trim().is_empty() || content.starts_with('#') {
            continue;
        }
        if content.starts_with('-') {
            first_item.get_or_insert_with(|| (start, indent.to_string()));
        } else if indent.is_empty() || first_item.is_none() {
            break;
        }
        end = offset;
    }

    Some(match first_item {
        Some((start, item_indent)) => ListSpan {
            range: start..end,
            key_line: None,
            item_indent,
        },
        None => ListSpan {
            range: key_start..after_key,
            key_line: Some(if key.ends_with('\n') {
                key.to_string()
            } else {
                format!("{key}\n")
            }),
            item_indent: DEFAULT_ITEM_INDENT.to_string(),
        },
    })
}

fn strip_comment(value: &str) -> &str {
    match value.find(" #") {
        Some(at) => &value[..at],
        None if value.trim_start().starts_with('#') => "",
        None => value,
    }
}

/// Body with the project list replaced by `projects`, one item per line.
fn rewrite_project_list(body: &str, projects: &[String]) -> String {
    let Some(span) = find_project_list(body) else {
        let mut out = body.to_string();
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&format!("{FEDORA_CI_KEY}:\n"));
        for project in projects {
            out.push_str(&format!("{DEFAULT_ITEM_INDENT}- {project}\n"));
        }
        return out;
    };

    let mut list = span.key_line.clone().unwrap_or_default();
    for project in projects {
        list.push_str(&format!("{}- {project}\n", span.item_indent));
    }

    let mut out = String::with_capacity(body.len() + list.len());
    out.push_str(&body[..span.range.start]);
    out.push_str(&list);
    out.push_str(&body[span.range.end..]);
    out
}

/// Package-to-maintainers map published by dist-git.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PagureBz {
    pub rpms: HashMap<String, Vec<String>>,
}

/// Split comma-separated maintainer arguments into a set.
pub fn parse_maintainers<S: AsRef<str>>(args: &[S]) -> BTreeSet<String> {
    args.iter()
        .flat_map(|arg| arg.as_ref().split(','))
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

/// Packages maintained by at least one of `maintainers`.
pub fn maintainer_packages(pagure_bz: &PagureBz, maintainers: &BTreeSet<String>) -> BTreeSet<String> {
    pagure_bz
        .rpms
        .iter()
        .filter(|(_, owners)| owners.iter().any(|o| maintainers.contains(o)))
        .map(|(package, _)| package.clone())
        .collect()
}

/// Packages listed in Zuul's `fedora-distgits.yaml`.
pub fn zuul_packages(yaml: &str) -> Result<Vec<String>> {
    let doc: Value = serde_yaml::from_str(yaml)?;
    let repositories = ["resources", "projects", "Fedora-Distgits", "source-repositories"]
        .iter()
        .try_fold(&doc, |node, key| node.get(*key))
        .and_then(Value::as_sequence)
        .ok_or_else(|| {
            ReleaseError::MissingKey(
                "resources.projects.Fedora-Distgits.source-repositories".to_string(),
            )
        })?;

    Ok(repositories
        .iter()
        .filter_map(|item| match item {
            Value::String(name) => Some(name.as_str()),
            Value::Mapping(entry) => entry.keys().next().and_then(Value::as_str),
            _ => None,
        })
        .map(|name| name.strip_prefix("rpms/").unwrap_or(name).to_string())
        .collect())
}

pub async fn fetch_pagure_bz(http: &reqwest::Client, url: &str) -> Result<PagureBz> {
    Ok(http
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json::<PagureBz>()
        .await?)
}

pub async fn fetch_zuul_packages(http: &reqwest::Client, url: &str) -> Result<Vec<String>> {
    let raw = http.get(url).send().await?.error_for_status()?.text().await?;
    zuul_packages(&raw)
}
