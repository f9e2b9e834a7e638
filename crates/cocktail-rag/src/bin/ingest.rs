//! One-shot ingestion from the command line
//!
//! Run with: cargo run -p cocktail-rag --features cli --bin cocktail-rag-ingest -- --config rag.toml

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use cocktail_rag::{config::RagConfig, server::state::AppState};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cocktail-rag-ingest")]
#[command(about = "Ingest library documents into the local vector index")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file (default: COCKTAIL_RAG_CONFIG)
    #[arg(short, long, env = "COCKTAIL_RAG_CONFIG")]
    config: Option<PathBuf>,

    /// List documents that have not been ingested yet and exit
    #[arg(long, conflicts_with_all = ["retag", "reset_state"])]
    pending: bool,

    /// Re-run semantic tagging over every indexed chunk
    #[arg(long, conflicts_with = "reset_state")]
    retag: bool,

    /// Forget which documents were ingested, then run a full pass
    #[arg(long)]
    reset_state: bool,
}

fn spinner(message: &str) -> anyhow::Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.green} {msg} [{elapsed}]")?,
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cocktail_rag=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = RagConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let state = AppState::new(config).context("initializing clients")?;
    let coordinator = state.coordinator();

    if cli.pending {
        let pending = coordinator.pending_documents().await?;
        for doc in &pending {
            println!("{}", doc.path);
        }
        println!("{} document(s) pending", pending.len());
        return Ok(());
    }

    if cli.retag {
        let progress = spinner("Retagging indexed chunks...")?;
        let report = coordinator.retag_all().await?;
        progress.finish_with_message(format!(
            "Retagged {}/{} chunks ({} failed)",
            report.updated, report.total, report.failed
        ));
        return Ok(());
    }

    if cli.reset_state {
        let cleared = coordinator.reset_state().await?;
        println!("Cleared {} ingested document(s) from state", cleared);
    }

    let progress = spinner("Ingesting documents...")?;
    let report = coordinator.run_once().await?;
    progress.finish_with_message(format!(
        "Ingestion {}: {} ingested, {} skipped, {} chunks, {} records in {} ms",
        report.status,
        report.ingested,
        report.skipped,
        report.chunks_indexed,
        report.count,
        report.duration_ms
    ));

    for path in &report.empty {
        println!("  empty:  {}", path);
    }
    for failure in &report.failed {
        println!("  failed: {} ({}: {})", failure.path, failure.kind, failure.message);
    }

    Ok(())
}
