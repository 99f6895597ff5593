//! AI Digest Agent binary entrypoint.
//! Loads configuration and secrets, wires the real providers and transports,
//! and runs the pipeline once or on a daily schedule.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ai_digest_agent::ai::gemini::GeminiClient;
use ai_digest_agent::ai::DynModelClient;
use ai_digest_agent::config::{secrets::Secrets, DigestConfig, RunMode};
use ai_digest_agent::{notify, pipeline, schedule};

#[derive(Debug, Parser)]
#[command(name = "ai-digest-agent", about = "RSS-to-email digest pipeline")]
struct Cli {
    /// Config file path; falls back to $DIGEST_CONFIG_PATH, then
    /// config/digest.toml.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides `run.mode` from the config file.
    #[arg(long, value_enum)]
    mode: Option<RunMode>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ai_digest_agent=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() {
    // Load .env in local/dev; no-op when the vars come from the host.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "aborted");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = match &cli.config {
        Some(path) => DigestConfig::load_from_file(path)?,
        None => DigestConfig::load_default()?,
    };
    let mode = cli.mode.unwrap_or(cfg.run.mode);

    let secrets = Secrets::from_env(cfg.email.provider)?;
    let client: DynModelClient = Arc::new(GeminiClient::new(
        secrets.gemini_api_key.clone(),
        std::time::Duration::from_secs(cfg.run.connect_timeout_secs),
        std::time::Duration::from_secs(cfg.run.request_timeout_secs),
    ));
    let sender = notify::build_sender(cfg.email.provider, &secrets)?;
    let providers = pipeline::build_providers(&cfg);

    match mode {
        RunMode::Once => {
            let report = pipeline::run(&cfg, &providers, &client, sender.as_ref()).await?;
            tracing::info!(?report, "single run complete");
            Ok(())
        }
        RunMode::Schedule => {
            schedule::run_loop(&cfg, &providers, &client, sender.as_ref()).await?;
            Ok(())
        }
    }
}
