//! `deployment-ops validate`: the validation cron job.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use forge_clients::{
    CoprClient, ForgeSettings, GitHubForge, GitLabForge, HttpTimeouts, SentrySink,
};
use tracing::{error, warn};
use validation_core::{
    BuildSystem, CaseOutcome, Deployment, ErrorSink, LogSink, SourceForge, ValidationConfig,
    ValidationRun, ValidationSuite,
};

/// Engine settings: a TOML file if given, then `VALIDATION_*` overrides.
pub(crate) fn load_config(path: Option<&Path>) -> Result<ValidationConfig> {
    let Some(path) = path else {
        return Ok(ValidationConfig::from_env()?);
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let mut config = ValidationConfig::from_toml_str(&raw)?;
    config.apply_env()?;
    Ok(config)
}

/// Forges with a token configured; the others are skipped.
pub(crate) fn configured_forges(
    settings: &ForgeSettings,
    timeouts: HttpTimeouts,
) -> Result<Vec<Arc<dyn SourceForge>>> {
    let mut forges: Vec<Arc<dyn SourceForge>> = Vec::new();

    match &settings.github_token {
        Some(token) => forges.push(Arc::new(
            GitHubForge::with_timeouts(
                &settings.github_api_url,
                token,
                &settings.github_repository,
                timeouts,
            )
            .context("Failed to set up the GitHub client")?,
        )),
        None => warn!("GITHUB_TOKEN was not set, skipping GitHub"),
    }
    match &settings.gitlab_token {
        Some(token) => forges.push(Arc::new(
            GitLabForge::with_timeouts(
                &settings.gitlab_url,
                token,
                &settings.gitlab_repository,
                timeouts,
            )
            .context("Failed to set up the GitLab client")?,
        )),
        None => warn!("GITLAB_TOKEN was not set, skipping GitLab"),
    }
    Ok(forges)
}

pub(crate) fn error_sink(
    settings: &ForgeSettings,
    deployment: Deployment,
    timeouts: HttpTimeouts,
) -> Result<Arc<dyn ErrorSink>> {
    match &settings.sentry_dsn {
        Some(dsn) => Ok(Arc::new(
            SentrySink::with_timeouts(dsn, timeouts)
                .context("SENTRY_SECRET is not a valid DSN")?
                .with_environment(deployment.name()),
        )),
        None => {
            warn!("SENTRY_SECRET was not set, failures are only logged");
            Ok(Arc::new(LogSink))
        }
    }
}

/// Human-readable summary, one block per test case.
pub(crate) fn render_outcomes(outcomes: &[CaseOutcome]) -> String {
    let mut out = String::new();
    for outcome in outcomes {
        let verdict = if outcome.passed { "PASS" } else { "FAIL" };
        let subject = match (&outcome.pr_title, &outcome.pr_url) {
            (Some(title), Some(url)) => format!("{title} ({url})"),
            (Some(title), None) => title.clone(),
            _ => "new pull request".to_string(),
        };
        let _ = writeln!(
            out,
            "{verdict}  [{}] {}: {subject}",
            outcome.trigger.name(),
            outcome.repository
        );
        for line in outcome.failure.lines().filter(|l| !l.trim().is_empty()) {
            let _ = writeln!(out, "      {line}");
        }
    }
    let failed = outcomes.iter().filter(|o| !o.passed).count();
    let _ = writeln!(out, "{} test case(s), {failed} failed", outcomes.len());
    out
}

/// Run the suite on every configured forge.
///
/// Failed test cases are reported, not returned as an error, and so is a
/// run without any forge token. The command only fails when a run could not
/// be carried out at all.
pub(crate) async fn cmd_validate(
    deployment: Deployment,
    config_path: Option<&Path>,
    json: bool,
) -> Result<()> {
    let settings = ForgeSettings::from_env();
    let config = load_config(config_path)?;
    validate_forges(&settings, &config, deployment, json).await
}

pub(crate) async fn validate_forges(
    settings: &ForgeSettings,
    config: &ValidationConfig,
    deployment: Deployment,
    json: bool,
) -> Result<()> {
    let timeouts = HttpTimeouts::from_config(config);
    let forges = configured_forges(settings, timeouts)?;
    if forges.is_empty() {
        warn!("no forge to validate, set GITHUB_TOKEN and/or GITLAB_TOKEN");
        return Ok(());
    }
    let builds: Arc<dyn BuildSystem> = Arc::new(
        CoprClient::with_timeouts(&settings.copr_url, timeouts)
            .context("Failed to set up the Copr client")?,
    );
    let sink = error_sink(settings, deployment, timeouts)?;

    let mut outcomes = Vec::new();
    let mut aborted = 0;
    for forge in forges {
        let repository = forge.repository();
        let run = ValidationRun::new(forge, builds.clone(), deployment.profile(), config.clone())
            .with_sink(sink.clone());
        match ValidationSuite::new(run).run_all().await {
            Ok(found) => outcomes.extend(found),
            Err(e) => {
                error!(repository = %repository, error = %e, "validation aborted");
                aborted += 1;
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    } else {
        print!("{}", render_outcomes(&outcomes));
    }

    if aborted > 0 {
        bail!("Validation aborted on {aborted} forge(s)");
    }
    Ok(())
}
