//! Application state for the RAG server

use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::Result;
use crate::generation::RagAnswerer;
use crate::ingestion::{ChunkTagger, IngestCoordinator, IngestionState};
use crate::providers;
use crate::retrieval::VectorIndex;
use crate::snapshot::SnapshotManager;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// Vector index shared with the answerer and the coordinator
    index: Arc<VectorIndex>,
    answerer: RagAnswerer,
    coordinator: IngestCoordinator,
    snapshot: SnapshotManager,
    /// Export and restore must not overlap
    snapshot_lock: tokio::sync::Mutex<()>,
}

impl AppState {
    /// Build every client from config and open the index
    pub fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("Initializing RAG application state...");

        let embedder = providers::build_embedder(&config)?;
        tracing::info!(
            "Embedding provider: {} ({} dimensions)",
            embedder.name(),
            embedder.dimensions()
        );
        let index = Arc::new(VectorIndex::open(&config.vector_db, embedder)?);

        let llm = providers::build_llm(&config)?;
        tracing::info!("LLM provider: {} ({})", llm.name(), llm.model());
        let web = providers::build_web_search(&config)?;
        let store = providers::build_object_store(&config)?;

        let answerer = RagAnswerer::new(index.clone(), llm.clone(), &config).with_web_search(web);
        let coordinator = IngestCoordinator::new(
            store,
            index.clone(),
            ChunkTagger::new(llm, config.llm.tagging_temperature),
            IngestionState::load(config.ingestion.state_path.clone()),
            &config,
        );

        Ok(Self::from_parts(config, index, answerer, coordinator))
    }

    /// Assemble state from pre-built components
    pub fn from_parts(
        config: RagConfig,
        index: Arc<VectorIndex>,
        answerer: RagAnswerer,
        coordinator: IngestCoordinator,
    ) -> Self {
        let snapshot = SnapshotManager::new(&config.snapshot);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                index,
                answerer,
                coordinator,
                snapshot,
                snapshot_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    /// Shared handle to the vector index
    pub fn index(&self) -> Arc<VectorIndex> {
        Arc::clone(&self.inner.index)
    }

    pub fn answerer(&self) -> &RagAnswerer {
        &self.inner.answerer
    }

    pub fn coordinator(&self) -> &IngestCoordinator {
        &self.inner.coordinator
    }

    pub fn snapshot(&self) -> &SnapshotManager {
        &self.inner.snapshot
    }

    pub fn snapshot_lock(&self) -> &tokio::sync::Mutex<()> {
        &self.inner.snapshot_lock
    }
}
