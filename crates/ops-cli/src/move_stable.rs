//! `deployment-ops move-stable`: the interactive weekly promotion.

use anyhow::{bail, Context, Result};
use chrono::{Days, Local, NaiveDate};
use dialoguer::{Confirm, Input};
use forge_clients::CoprClient;
use release_tools::promotion::{NAMESPACE, REPOSITORIES, REPOS_FOR_BLOG, ROLLING_BRANCH, STABLE_BRANCH};
use release_tools::{
    copr_dependencies, wait_for_dependencies, BlogPost, GithubQuery, RepoStore, WaitEvent,
};
use tracing::info;
use validation_core::SystemClock;

pub(crate) fn cmd_init(store: &RepoStore) -> Result<()> {
    let cloned = store
        .init()
        .with_context(|| format!("Failed to create {}", store.root().display()))?;
    println!(
        "Cloned {cloned} repositories into {}",
        store.root().display()
    );
    Ok(())
}

pub(crate) async fn cmd_stalk_copr(store: &RepoStore, copr: &CoprClient, repository: &str) -> Result<()> {
    let dependencies = copr_dependencies(repository);
    if dependencies.is_empty() {
        println!("No Copr dependencies set.");
        return Ok(());
    }

    let total = dependencies.len();
    let mut done = 0;
    wait_for_dependencies(
        dependencies,
        copr,
        &SystemClock,
        |dependency| store.short_ref(dependency.repository, STABLE_BRANCH),
        |event| match event {
            WaitEvent::Checking(dep) => println!("[{done}/{total}] checking {}", dep.package),
            WaitEvent::Finished(dep) => {
                done += 1;
                println!("[{done}/{total}] {} has finished", dep.package);
            }
            WaitEvent::Requeued(dep) => {
                println!("[{done}/{total}] {} has not finished yet, requeued", dep.package)
            }
            WaitEvent::CoolingDown => info!("waiting before the next round of Copr checks"),
        },
    )
    .await
    .with_context(|| format!("Failed waiting for Copr dependencies of {repository}"))?;
    Ok(())
}

pub(crate) async fn cmd_move_repository(
    store: &RepoStore,
    copr: &CoprClient,
    repository: &str,
    update_monorepo: bool,
) -> Result<()> {
    println!("==> Moving {repository}");
    println!("===> Fetching");
    store
        .fetch(repository)
        .with_context(|| format!("Failed to fetch {repository}"))?;

    let heads = store.branch_heads(repository)?;
    if heads.is_even() {
        println!(
            "===> {ROLLING_BRANCH} and {STABLE_BRANCH} are even for {NAMESPACE}/{repository} => Skipping"
        );
        return Ok(());
    }

    println!("===> Waiting for Copr dependencies");
    cmd_stalk_copr(store, copr, repository).await?;

    println!(
        "===> Commits since {STABLE_BRANCH} ({}) till HEAD of {ROLLING_BRANCH} ({})\n",
        heads.stable, heads.main
    );
    println!("{}\n", store.pending_commits(repository, &heads)?);

    let new_stable: String = Input::new()
        .with_prompt(format!("Enter new hash for {STABLE_BRANCH}"))
        .default(heads.main.clone())
        .interact_text()?;

    println!("New HEAD of {STABLE_BRANCH}: {new_stable}");
    let confirmed = Confirm::new()
        .with_prompt("Is that correct?")
        .default(true)
        .interact()?;
    if confirmed {
        store
            .move_stable(repository, &new_stable)
            .with_context(|| format!("Failed to move {STABLE_BRANCH} of {repository}"))?;
    } else {
        println!("===> Not moving {STABLE_BRANCH} branch");
    }
    println!();

    if update_monorepo {
        println!("===> Updating {repository}'s reference in monorepo");
        store.update_monorepo(&format!("chore: production move of {repository}"), Some(repository))?;
    }
    Ok(())
}

pub(crate) async fn cmd_move_all(store: &RepoStore, copr: &CoprClient) -> Result<()> {
    if !store.exists() {
        bail!("Directory with repositories doesn't exist, please run init command first!");
    }
    for repository in REPOSITORIES {
        cmd_move_repository(store, copr, repository, false).await?;
    }

    println!("==> Updating references to {STABLE_BRANCH} in monorepo");
    store.update_monorepo("chore: weekly deployment", None)?;

    cmd_create_blogpost(store, None, None)
}

pub(crate) fn cmd_github_query(till: Option<NaiveDate>) -> Result<()> {
    let query = GithubQuery::ending(till.unwrap_or_else(today));
    println!(
        "PRs merged since:\t{}\t(may overlap with the latest blog, exactly on {})",
        query.since.format("%Y-%m-%d"),
        query.since_weekday()
    );
    println!("PRs merged till:\t{}", query.till.format("%Y-%m-%d"));
    println!("Link with filter: {}", query.url());
    Ok(())
}

pub(crate) fn cmd_create_blogpost(
    store: &RepoStore,
    since: Option<NaiveDate>,
    till: Option<NaiveDate>,
) -> Result<()> {
    let today = today();
    let till = till.unwrap_or(today);
    let since = since.unwrap_or_else(|| till.checked_sub_days(Days::new(6)).unwrap_or(till));
    let post = BlogPost {
        since,
        till,
        today,
        author: store.author(),
    };

    let mut changelogs = Vec::with_capacity(REPOS_FOR_BLOG.len());
    for repository in REPOS_FOR_BLOG {
        changelogs.push(
            store
                .blog_changelog(repository, since)
                .with_context(|| format!("Failed to collect release notes of {repository}"))?,
        );
    }

    println!("Here is a template for this week's blogpost (modifications may be needed)\n");
    println!("Please put it in an according directory: {}\n", post.location());
    print!("{}", post.render(&changelogs));
    Ok(())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
