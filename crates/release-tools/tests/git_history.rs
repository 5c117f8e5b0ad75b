//! Changelog and stable promotion against throwaway git repositories.

use std::path::Path;
use std::process::Command;

use release_tools::{changelog, RepoStore};

fn run_git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn configure(dir: &Path) {
    run_git(dir, &["config", "user.name", "test-user"]);
    run_git(dir, &["config", "user.email", "test@example.com"]);
    run_git(dir, &["config", "commit.gpgsign", "false"]);
}

fn make_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    run_git(dir.path(), &["init", "--initial-branch=main"]);
    configure(dir.path());
    run_git(dir.path(), &["commit", "--allow-empty", "-m", "initial"]);
    dir
}

fn merge_feature(dir: &Path, branch: &str, paragraphs: &[&str]) {
    run_git(dir, &["checkout", "-b", branch]);
    run_git(dir, &["commit", "--allow-empty", "-m", &format!("work on {branch}")]);
    run_git(dir, &["checkout", "main"]);
    let message = paragraphs.join("\n\n");
    run_git(dir, &["merge", "--no-ff", "--no-edit", "-m", &message, branch]);
}

#[test]
fn changelog_lists_merges_since_ref() {
    let repo = make_repo();
    merge_feature(
        repo.path(),
        "old",
        &["Merge pull request #1 from a/old", "Already released."],
    );
    run_git(repo.path(), &["tag", "0.1.0"]);

    merge_feature(
        repo.path(),
        "docs",
        &["Merge pull request #2 from a/docs", "Fix typo", "N/A"],
    );
    merge_feature(
        repo.path(),
        "feature",
        &[
            "Merge pull request #3 from a/feature",
            "Add dry run",
            "Added `--dry-run` to `propose-downstream`.",
            "Reviewed-by: Jane Roe",
        ],
    );

    let log = changelog::since_ref(repo.path(), "0.1.0").unwrap();

    assert_eq!(log, "- Added `--dry-run` to `propose-downstream`.\n");
}

#[test]
fn changelog_of_unknown_ref_fails() {
    let repo = make_repo();
    assert!(changelog::since_ref(repo.path(), "no-such-tag").is_err());
}

#[test]
fn stable_is_promoted_to_main() {
    let upstream = tempfile::tempdir().unwrap();
    run_git(upstream.path(), &["init", "--bare", "--initial-branch=main"]);
    let upstream_url = upstream.path().to_string_lossy().to_string();

    let seed = make_repo();
    run_git(seed.path(), &["remote", "add", "origin", &upstream_url]);
    run_git(seed.path(), &["branch", "stable"]);
    run_git(seed.path(), &["push", "origin", "main", "stable"]);
    run_git(seed.path(), &["commit", "--allow-empty", "-m", "new feature"]);
    run_git(seed.path(), &["push", "origin", "main"]);
    let main_sha = run_git(seed.path(), &["rev-parse", "HEAD"]);

    let store_dir = tempfile::tempdir().unwrap();
    run_git(store_dir.path(), &["clone", &upstream_url, "ogr"]);
    configure(&store_dir.path().join("ogr"));
    let store = RepoStore::new(store_dir.path(), "origin");

    store.fetch("ogr").unwrap();
    let heads = store.branch_heads("ogr").unwrap();
    assert!(!heads.is_even());
    assert_eq!(heads.main, main_sha[..7]);
    assert!(store
        .pending_commits("ogr", &heads)
        .unwrap()
        .contains("new feature"));

    store.move_stable("ogr", &heads.main).unwrap();

    let remote_stable = run_git(seed.path(), &["ls-remote", "origin", "refs/heads/stable"]);
    assert!(remote_stable.starts_with(&main_sha));
    store.fetch("ogr").unwrap();
    assert!(store.branch_heads("ogr").unwrap().is_even());
}
