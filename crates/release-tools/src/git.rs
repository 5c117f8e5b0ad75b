//! Thin wrappers over the `git` command line.

use std::path::Path;
use std::process::Command;

use chrono::NaiveDate;
use tracing::debug;

use crate::error::{ReleaseError, Result};

/// Length of the abbreviated hashes shown to and typed by the operator.
pub const SHORT_HASH_LEN: usize = 7;

/// Separator between commit messages in `git log` output.
const RECORD_SEPARATOR: char = '\u{1e}';

/// Run git in `dir` and return its trimmed stdout.
pub fn run(dir: &Path, args: &[&str]) -> Result<String> {
    debug!(dir = %dir.display(), ?args, "running git");
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| ReleaseError::Git {
            command: args.join(" "),
            message: format!("failed to run git: {e}"),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ReleaseError::Git {
            command: args.join(" "),
            message: stderr.trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Abbreviate a commit hash.
pub fn short(sha: &str) -> &str {
    match sha.char_indices().nth(SHORT_HASH_LEN) {
        Some((idx, _)) => &sha[..idx],
        None => sha,
    }
}

/// Full hash of the remote-tracking branch `<remote>/<branch>`.
pub fn remote_ref(dir: &Path, remote: &str, branch: &str) -> Result<String> {
    let pattern = format!("refs/remotes/{remote}/{branch}");
    let out = run(dir, &["show-ref", "-s", "--verify", &pattern])?;
    out.lines()
        .next()
        .map(str::to_string)
        .ok_or_else(|| ReleaseError::Git {
            command: format!("show-ref {pattern}"),
            message: "no such reference".to_string(),
        })
}

pub fn fetch_all(dir: &Path) -> Result<()> {
    run(dir, &["fetch", "--all"]).map(drop)
}

/// Messages of the merge commits reachable from `rev`, newest first.
pub fn merge_messages(dir: &Path, rev: &str, since: Option<NaiveDate>) -> Result<Vec<String>> {
    let format = format!("--format=%B{RECORD_SEPARATOR}");
    let since_arg = since.map(|d| format!("--since={}", d.format("%Y-%m-%d")));
    let mut args = vec!["log", "--merges", format.as_str()];
    if let Some(since) = since_arg.as_deref() {
        args.push(since);
    }
    args.push(rev);

    let out = run(dir, &args)?;
    Ok(out
        .split(RECORD_SEPARATOR)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect())
}

/// One-line graph of the commits in `from..to`.
pub fn log_graph(dir: &Path, from: &str, to: &str) -> Result<String> {
    let range = format!("{from}..{to}");
    run(dir, &["--no-pager", "log", "--oneline", "--graph", &range])
}

pub fn force_branch(dir: &Path, branch: &str, sha: &str) -> Result<()> {
    run(dir, &["branch", "-f", branch, sha]).map(drop)
}

pub fn push(dir: &Path, remote: &str, branch: &str) -> Result<()> {
    run(dir, &["push", remote, branch]).map(drop)
}

pub fn clone(into: &Path, url: &str, recurse_submodules: bool) -> Result<()> {
    let mut args = vec!["clone"];
    if recurse_submodules {
        args.push("--recurse-submodules");
    }
    args.push(url);
    run(into, &args).map(drop)
}

/// Value of a git config key, `None` when unset.
pub fn config_value(dir: &Path, key: &str) -> Option<String> {
    run(dir, &["config", "--get", key])
        .ok()
        .filter(|v| !v.is_empty())
}
