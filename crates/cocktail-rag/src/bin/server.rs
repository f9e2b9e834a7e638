//! RAG Server binary
//!
//! Run with: cargo run -p cocktail-rag --bin cocktail-rag-server [config.toml]

use std::path::PathBuf;

use cocktail_rag::{config::RagConfig, server::RagServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cocktail_rag=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                      CocktailGPT RAG                      ║
║        Beverage Science Q&A with Source Citations         ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    // Config file: first argument, then COCKTAIL_RAG_CONFIG
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("COCKTAIL_RAG_CONFIG").ok())
        .map(PathBuf::from);
    let config = RagConfig::load(config_path.as_deref())?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Storage: {:?} ({}/{})", config.storage.backend, config.storage.bucket, config.storage.prefix);
    tracing::info!("  - Embedding model: {}", config.embeddings.model);
    tracing::info!("  - LLM model: {}", config.llm.model);
    tracing::info!("  - Index: {}", config.vector_db.storage_path.display());
    if config.web_search.api_key.is_none() {
        tracing::warn!("SERPAPI_API_KEY not set; web search fallback is disabled");
    }

    let run_on_startup = config.ingestion.run_on_startup;
    let server = RagServer::new(config)?;

    if run_on_startup {
        let state = server.state();
        tokio::spawn(async move {
            tracing::info!("Running startup ingestion");
            match state.coordinator().run_once().await {
                Ok(report) => tracing::info!(
                    ingested = report.ingested,
                    skipped = report.skipped,
                    failed = report.failed.len(),
                    count = report.count,
                    "Startup ingestion finished"
                ),
                Err(e) => tracing::error!("Startup ingestion failed: {}", e),
            }
        });
    }

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("\nEndpoints:");
    println!("  POST /ask               - Ask a question");
    println!("  GET  /run-once          - Ingest new documents");
    println!("  POST /snapshot/export   - Zip the index");
    println!("  POST /snapshot/restore  - Restore an uploaded index");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
