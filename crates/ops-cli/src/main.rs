//! deployment-ops - validation jobs and release tooling
//!
//! ## Commands
//!
//! - `validate`: run the build-validation suite against the test repositories
//! - `serve-acme`: answer one ACME HTTP-01 challenge
//! - `changelog`: changelog from merge commits since a reference
//! - `move-stable`: weekly promotion of `main` to `stable`
//! - `webhook-token`: GitLab webhook secret for a namespace or project
//! - `setupcfg2rpm`: RPM requirements from `setup.cfg`
//! - `enroll-users` / `migrate-zuul-users`: Fedora CI onboarding

mod move_stable;
mod validate;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use forge_clients::{CoprClient, ForgeSettings, HttpTimeouts};
use release_tools::onboarding::{
    self, DEFAULT_SERVICE_CONFIG, PAGURE_BZ_URL, ZUUL_DISTGITS_URL,
};
use release_tools::promotion::DEFAULT_REPO_STORE;
use release_tools::{changelog, setupcfg, webhook, RepoStore, ServiceConfigTemplate};
use tracing::{info, Level};
use validation_core::{Deployment, DEPLOYMENT_ENV};

#[derive(Parser)]
#[command(name = "deployment-ops")]
#[command(author = "Deployment Maintainers")]
#[command(version = validation_core::VERSION)]
#[command(about = "Validation cron jobs and release tooling for the build service", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the deployed service by provoking builds on the test repositories
    Validate {
        /// Deployment under test (production or staging)
        #[arg(long, env = DEPLOYMENT_ENV, default_value = "production")]
        deployment: Deployment,

        /// TOML file with timeouts, intervals and rejection markers
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Serve one ACME HTTP-01 challenge until interrupted
    ServeAcme {
        /// Request path to answer
        path: String,

        /// Content returned for the path
        content: String,

        /// Address to listen on
        #[arg(long, default_value = acme_responder::DEFAULT_BIND)]
        bind: SocketAddr,
    },

    /// Print the changelog from merge commits since REF
    Changelog {
        /// Reference (tag, branch or commit) the changelog starts after
        reference: String,

        /// Git repository to read (default: current directory)
        #[arg(long, default_value = ".")]
        git_dir: PathBuf,
    },

    /// Move the stable branches of the service repositories
    MoveStable {
        #[command(subcommand)]
        action: MoveStableAction,
    },

    /// Generate a secret token for GitLab webhooks
    WebhookToken {
        /// Service configuration holding `gitlab_token_secret`
        service_config: PathBuf,

        /// Groups and subgroups of the repository, joined by '/'
        namespace: String,

        /// Repository name; omit for a namespace-wide token
        repo_name: Option<String>,
    },

    /// Print `python3dist(...)` requirements from setup.cfg
    #[command(name = "setupcfg2rpm")]
    SetupCfg2Rpm {
        /// Path to setup.cfg
        path: PathBuf,
    },

    /// Enable Fedora CI for every package of the given maintainers
    EnrollUsers {
        /// Comma-separated FAS maintainers or groups
        #[arg(required = true)]
        maintainers: Vec<String>,

        /// Service configuration template to update
        #[arg(long, default_value = DEFAULT_SERVICE_CONFIG)]
        config: PathBuf,
    },

    /// Enable Fedora CI for every package currently using Zuul
    MigrateZuulUsers {
        /// Service configuration template to update
        #[arg(long, default_value = DEFAULT_SERVICE_CONFIG)]
        config: PathBuf,
    },
}

#[derive(Subcommand)]
enum MoveStableAction {
    /// Clone all the repositories to work with
    Init {
        /// Directory to clone into (created if missing)
        #[arg(default_value = DEFAULT_REPO_STORE)]
        repo_store: PathBuf,
    },

    /// Interactively move the stable branch of one repository
    MoveRepository {
        /// Repository cloned in the repo store
        repository: String,

        #[command(flatten)]
        store: StoreArgs,

        /// Update the monorepo reference afterwards
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        update_monorepo: bool,
    },

    /// Interactively move the stable branch of every repository
    MoveAll {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Print the search URL for merged pull requests with release notes
    GithubQuery {
        /// Last day a PR could have been merged (default: today)
        #[arg(long)]
        till: Option<NaiveDate>,
    },

    /// Print a blog post template from the release notes
    CreateBlogpost {
        #[command(flatten)]
        store: StoreArgs,

        /// First day to collect release notes for (default: six days before --till)
        #[arg(long)]
        since: Option<NaiveDate>,

        /// Last day to collect release notes for (default: today)
        #[arg(long)]
        till: Option<NaiveDate>,
    },

    /// Wait for the Copr dependencies of a repository
    StalkCopr {
        /// Repository cloned in the repo store
        repository: String,

        #[command(flatten)]
        store: StoreArgs,
    },
}

#[derive(clap::Args)]
struct StoreArgs {
    /// Remote that represents upstream
    #[arg(long, default_value = "origin")]
    remote: String,

    /// Directory holding the cloned repositories
    #[arg(long, default_value = DEFAULT_REPO_STORE)]
    repo_store: PathBuf,
}

impl StoreArgs {
    fn open(&self) -> RepoStore {
        RepoStore::new(&self.repo_store, &self.remote)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    validation_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Validate { deployment, config } => {
            validate::cmd_validate(deployment, config.as_deref(), cli.json).await
        }
        Commands::ServeAcme {
            path,
            content,
            bind,
        } => cmd_serve_acme(&path, &content, bind).await,
        Commands::Changelog { reference, git_dir } => cmd_changelog(&git_dir, &reference),
        Commands::MoveStable { action } => cmd_move_stable(action).await,
        Commands::WebhookToken {
            service_config,
            namespace,
            repo_name,
        } => cmd_webhook_token(&service_config, &namespace, repo_name.as_deref()),
        Commands::SetupCfg2Rpm { path } => cmd_setupcfg2rpm(&path),
        Commands::EnrollUsers {
            maintainers,
            config,
        } => cmd_enroll_users(&maintainers, &config).await,
        Commands::MigrateZuulUsers { config } => cmd_migrate_zuul_users(&config).await,
    }
}

async fn cmd_serve_acme(path: &str, content: &str, bind: SocketAddr) -> Result<()> {
    let challenge = acme_responder::AcmeChallenge::new(path, content)?;
    acme_responder::serve(bind, challenge, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
    .with_context(|| format!("ACME responder on {bind}"))
}

fn cmd_changelog(git_dir: &Path, reference: &str) -> Result<()> {
    let log = changelog::since_ref(git_dir, reference)
        .with_context(|| format!("Failed to read merges since {reference}"))?;
    println!("{log}");
    Ok(())
}

async fn cmd_move_stable(action: MoveStableAction) -> Result<()> {
    let copr = || -> Result<CoprClient> {
        Ok(CoprClient::new(&ForgeSettings::from_env().copr_url)?)
    };
    match action {
        MoveStableAction::Init { repo_store } => {
            move_stable::cmd_init(&RepoStore::new(repo_store, "origin"))
        }
        MoveStableAction::MoveRepository {
            repository,
            store,
            update_monorepo,
        } => {
            move_stable::cmd_move_repository(&store.open(), &copr()?, &repository, update_monorepo)
                .await
        }
        MoveStableAction::MoveAll { store } => {
            move_stable::cmd_move_all(&store.open(), &copr()?).await
        }
        MoveStableAction::GithubQuery { till } => move_stable::cmd_github_query(till),
        MoveStableAction::CreateBlogpost { store, since, till } => {
            move_stable::cmd_create_blogpost(&store.open(), since, till)
        }
        MoveStableAction::StalkCopr { repository, store } => {
            move_stable::cmd_stalk_copr(&store.open(), &copr()?, &repository).await
        }
    }
}

fn webhook_token_for(service_config: &Path, namespace: &str, repo_name: Option<&str>) -> Result<String> {
    let secret = webhook::read_token_secret(service_config)
        .with_context(|| format!("Failed to read the token secret from {}", service_config.display()))?;
    Ok(webhook::webhook_token(&secret, namespace, repo_name)?)
}

fn cmd_webhook_token(service_config: &Path, namespace: &str, repo_name: Option<&str>) -> Result<()> {
    println!("{}", webhook_token_for(service_config, namespace, repo_name)?);
    Ok(())
}

fn cmd_setupcfg2rpm(path: &Path) -> Result<()> {
    let requirements = setupcfg::rpm_requirements_from_file(path)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    println!("{}", requirements.join("\n"));
    Ok(())
}

/// Add the packages to the template and report how many were new.
fn enroll_into(config_path: &Path, packages: impl IntoIterator<Item = String>) -> Result<usize> {
    let mut config = ServiceConfigTemplate::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    let added = config.enroll(packages);
    config
        .save(config_path)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    Ok(added)
}

async fn cmd_enroll_users(maintainers: &[String], config_path: &Path) -> Result<()> {
    let maintainers = onboarding::parse_maintainers(maintainers);
    println!(
        "Onboarding packages for {}",
        maintainers.iter().cloned().collect::<Vec<_>>().join(", ")
    );

    let http = HttpTimeouts::default().client()?;
    let pagure_bz = onboarding::fetch_pagure_bz(&http, PAGURE_BZ_URL)
        .await
        .context("Failed to fetch the package maintainers")?;
    let packages = onboarding::maintainer_packages(&pagure_bz, &maintainers);
    info!(packages = packages.len(), "found maintained packages");

    let added = enroll_into(config_path, packages)?;
    println!("Number of projects added: {added}");
    Ok(())
}

async fn cmd_migrate_zuul_users(config_path: &Path) -> Result<()> {
    let http = HttpTimeouts::default().client()?;
    let packages = onboarding::fetch_zuul_packages(&http, ZUUL_DISTGITS_URL)
        .await
        .context("Failed to fetch the Zuul project list")?;
    info!(packages = packages.len(), "found Zuul packages");

    let added = enroll_into(config_path, packages)?;
    println!("Number of projects added: {added}");
    Ok(())
}
