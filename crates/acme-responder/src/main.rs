use std::net::SocketAddr;

use acme_responder::{serve, AcmeChallenge, DEFAULT_BIND};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Answer one ACME HTTP-01 challenge until interrupted.
#[derive(Parser)]
#[command(name = "serve-acme-challenge", version)]
struct Cli {
    /// Request path to answer, e.g. /.well-known/acme-challenge/<token>
    path: String,

    /// Key authorization returned for the path
    content: String,

    /// Address to listen on
    #[arg(long, default_value = DEFAULT_BIND)]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let challenge = AcmeChallenge::new(&cli.path, &cli.content)?;
    serve(cli.bind, challenge, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
    .with_context(|| format!("ACME responder on {}", cli.bind))
}
