//! docsync CLI entry point.
//!
//! This binary is the composition root. It:
//!
//! 1. Loads `.env`, parses flags, and resolves [`config::Settings`].
//! 2. Installs the `tracing` subscriber (and OTLP export when configured).
//! 3. Builds the GitHub and Anthropic adapters and injects them into a
//!    [`pipeline::SyncPipeline`].
//! 4. Runs one read-transform-write cycle and exits non-zero on failure.

mod config;
mod telemetry;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use github::{GithubContents, GithubOptions};
use llm::{AnthropicOptions, AnthropicProvider};
use pipeline::{ContentStore, SyncPipeline, TextTransformer};
use tracing::{error, info};

use crate::config::Settings;
use crate::telemetry::LogFormat;

/// Rewrites one repository document with an LLM and commits the result.
#[derive(Debug, Parser)]
#[command(name = "docsync", version, about)]
pub struct Cli {
    /// Config file; defaults to ./docsync.toml when present.
    #[arg(long, env = "DOCSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Repository owner (overrides DOCSYNC_OWNER).
    #[arg(long)]
    pub owner: Option<String>,

    /// Repository name (overrides DOCSYNC_REPO).
    #[arg(long)]
    pub repo: Option<String>,

    /// Branch to read from and commit to; the default branch when omitted.
    #[arg(long)]
    pub branch: Option<String>,

    /// Document path inside the repository (overrides DOCSYNC_PATH).
    #[arg(long)]
    pub path: Option<String>,

    /// Instructions for the rewrite (overrides DOCSYNC_INSTRUCTIONS).
    #[arg(long)]
    pub instructions: Option<String>,

    /// Console log format.
    #[arg(long, value_enum, env = "DOCSYNC_LOG_FORMAT", default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let telemetry = match telemetry::init(cli.log_format) {
        Ok(telemetry) => telemetry,
        Err(e) => {
            eprintln!("docsync: failed to initialise logging: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let code = match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "docsync run failed");
            ExitCode::FAILURE
        }
    };

    telemetry.shutdown();
    code
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = config::load(&cli, |key| std::env::var(key).ok())?;

    let pipeline = build_pipeline(&settings)?;

    info!(
        repo = %settings.repo,
        path = %settings.path,
        model = %settings.params.model(),
        "starting document sync"
    );

    let report = pipeline
        .run(&settings.repo, &settings.path, &settings.instructions)
        .await?;

    info!(
        run_id = %report.run_id,
        started_at = %report.started_at,
        path = %report.write.path,
        mode = %report.write.mode,
        sha = %report.write.sha,
        used_default = report.used_default,
        input_tokens = report.usage.input_tokens.as_u64(),
        output_tokens = report.usage.output_tokens.as_u64(),
        total_cost = %report.cost.total,
        "document sync complete"
    );
    Ok(())
}

fn build_pipeline(settings: &Settings) -> anyhow::Result<SyncPipeline> {
    let github = GithubContents::new(GithubOptions {
        token: settings.github_token.clone(),
        api_base: settings.github_api_base.clone(),
        branch: settings.branch.clone(),
        timeout: settings.github_timeout,
    })?;

    let anthropic = AnthropicProvider::new(AnthropicOptions {
        api_key: settings.anthropic_api_key.clone(),
        api_base: settings.llm_api_base.clone(),
        timeout: settings.llm_timeout,
    })?;

    let store = ContentStore::new(Arc::new(github), settings.defaults.clone())
        .with_agent_name(settings.agent_name.clone());
    let transformer = TextTransformer::new(
        Arc::new(anthropic),
        settings.params.clone(),
        settings.prices,
    );

    Ok(SyncPipeline::new(store, transformer))
}
