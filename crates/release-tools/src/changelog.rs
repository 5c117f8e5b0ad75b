//! Changelog entries harvested from merge commit messages.
//!
//! The entry is the last paragraph of the pull-request description that the
//! merge commit carries, with the trailer block starting at `Reviewed-by`
//! cut off.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::Result;
use crate::git;

/// Entries that mean "nothing to announce".
pub const NOT_IMPORTANT_VALUES: [&str; 3] = ["n/a", "none", "none."];

const TRAILER_MARKER: &str = "Reviewed-by";

/// Repository used to turn `#123` references into Markdown links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLink {
    pub namespace: String,
    pub repository: String,
}

impl RepoLink {
    pub fn new(namespace: &str, repository: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            repository: repository.to_string(),
        }
    }

    /// Replace bare `#<n>` references with links to the pull request.
    pub fn linkify(&self, entry: &str) -> String {
        static ISSUE_REF: OnceLock<Option<Regex>> = OnceLock::new();
        let Some(re) = ISSUE_REF
            .get_or_init(|| Regex::new(r"(?P<pre>^|[\s(])#(?P<num>\d+)\b").ok())
            .as_ref()
        else {
            return entry.to_string();
        };
        let replacement = format!(
            "${{pre}}[{repo}#${{num}}](https://github.com/{ns}/{repo}/pull/${{num}})",
            ns = self.namespace,
            repo = self.repository,
        );
        re.replace_all(entry, replacement.as_str()).into_owned()
    }
}

/// Extract the changelog entry from one merge commit message.
pub fn convert_message(message: &str) -> String {
    let cleared = message.split(TRAILER_MARKER).next().unwrap_or_default().trim();
    cleared
        .split("\n\n")
        .last()
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn is_important(entry: &str) -> bool {
    let lowered = entry.to_lowercase();
    !NOT_IMPORTANT_VALUES.contains(&lowered.as_str())
}

/// Render `- <entry>` lines for the given merge commit messages.
pub fn render<I, S>(messages: I, link: Option<&RepoLink>) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut changelog = String::new();
    for message in messages {
        let entry = convert_message(message.as_ref());
        if !is_important(&entry) {
            continue;
        }
        let entry = match link {
            Some(link) => link.linkify(&entry),
            None => entry,
        };
        changelog.push_str("- ");
        changelog.push_str(&entry);
        changelog.push('\n');
    }
    changelog
}

/// Changelog of the merges in `<reference>..HEAD` of the repository at `git_dir`.
pub fn since_ref(git_dir: &Path, reference: &str) -> Result<String> {
    let range = format!("{reference}..HEAD");
    let messages = git::merge_messages(git_dir, &range, None)?;
    Ok(render(messages, None))
}
