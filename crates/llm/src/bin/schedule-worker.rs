//! schedule-worker: runs one scheduling request through the engine.
//!
//! Reads a `ScheduleRequest` as JSON, drives the Planning/Acting/Finishing
//! loop against the configured LLM provider (or the offline capability set),
//! and writes the `ScheduleResponse` as JSON to stdout or a file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::time::Instant;
use tracing::{info, warn};

use lineup_core::{config::load_dotenv, Config};
use lineup_engine::{offline_capabilities, ScheduleRequest, ScheduleRunner};
use lineup_llm::LlmCapabilities;

// ── CLI ─────────────────────────────────────────────────────────────

/// Automated schedule worker: fills one channel's broadcast window.
#[derive(Parser, Debug)]
#[command(name = "schedule-worker", version, about)]
struct Cli {
    /// Path to the schedule request JSON file.
    #[arg(long, env = "SCHEDULE_REQUEST")]
    request: PathBuf,

    /// Write the response JSON here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Run on the deterministic offline capabilities, no LLM calls.
    #[arg(long)]
    offline: bool,

    /// Per-capability-call budget in seconds (overrides CAPABILITY_TIMEOUT_SECS).
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Overall wall-clock budget in seconds; past it the run returns its
    /// partial result.
    #[arg(long)]
    deadline_secs: Option<u64>,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    load_dotenv();
    let config = Config::from_env();
    config.log_summary();

    let raw = std::fs::read_to_string(&cli.request)
        .with_context(|| format!("reading request file {}", cli.request.display()))?;
    let request: ScheduleRequest = serde_json::from_str(&raw)
        .with_context(|| format!("parsing request file {}", cli.request.display()))?;

    let capabilities = if cli.offline {
        info!("running on the offline capability set");
        offline_capabilities()
    } else if !config.llm.is_configured() {
        warn!(
            provider = %config.llm.provider,
            "LLM provider not configured, falling back to the offline capability set"
        );
        offline_capabilities()
    } else {
        LlmCapabilities::from_config(&config)?.into_capabilities()
    };

    let timeout_secs = cli
        .timeout_secs
        .unwrap_or(config.engine.capability_timeout_secs);
    let mut runner =
        ScheduleRunner::new(capabilities).with_capability_timeout(Duration::from_secs(timeout_secs));
    if let Some(secs) = cli.deadline_secs {
        runner = runner.with_deadline(Instant::now() + Duration::from_secs(secs));
    }

    let response = runner.run(request).await?;
    info!(
        status = %response.summary.completion_status,
        iterations = response.summary.total_iterations,
        slots = response.slots.len(),
        unfilled_minutes = response.summary.unfilled_minutes,
        "schedule produced"
    );

    let rendered = serde_json::to_string_pretty(&response)?;
    match &cli.output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("writing response to {}", path.display()))?;
            info!(path = %path.display(), "response written");
        }
        None => println!("{rendered}"),
    }

    Ok(())
}
