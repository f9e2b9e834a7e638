//! Provider abstraction layer for external services
//!
//! Each external dependency sits behind a trait so the ingestion
//! coordinator and the answerer receive explicit client objects:
//! - Object store: Supabase Storage or a local directory
//! - Embeddings: OpenAI-compatible API or offline feature hashing
//! - LLM: OpenAI-compatible chat completions
//! - Web search: SerpAPI
//! - Vector store: the embedded index in [`crate::retrieval`]

pub mod embedding;
pub mod hashing;
pub mod llm;
pub mod local;
pub mod object_store;
pub mod openai;
pub mod serpapi;
pub mod supabase;
pub mod vector_store;
pub mod web_search;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use crate::config::{EmbeddingBackend, RagConfig, StorageBackend};
use crate::error::Result;

pub use embedding::EmbeddingProvider;
pub use hashing::HashingEmbedder;
pub use llm::LlmProvider;
pub use local::LocalObjectStore;
pub use object_store::{list_recursive, ObjectEntry, ObjectStoreProvider};
pub use openai::{OpenAiChat, OpenAiEmbedder};
pub use serpapi::SerpApiClient;
pub use supabase::SupabaseStorage;
pub use vector_store::VectorStoreProvider;
pub use web_search::{WebResult, WebSearchProvider};

/// Object store for the configured backend
pub fn build_object_store(config: &RagConfig) -> Result<Arc<dyn ObjectStoreProvider>> {
    let store: Arc<dyn ObjectStoreProvider> = match config.storage.backend {
        StorageBackend::Supabase => {
            tracing::info!(bucket = %config.storage.bucket, "Using Supabase storage");
            Arc::new(SupabaseStorage::new(&config.storage)?)
        }
        StorageBackend::Local => {
            tracing::info!(root = %config.storage.local_root.display(), "Using local object store");
            Arc::new(LocalObjectStore::new(config.storage.local_root.clone()))
        }
    };
    Ok(store)
}

/// Embedder for the configured backend
pub fn build_embedder(config: &RagConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let embedder: Arc<dyn EmbeddingProvider> = match config.embeddings.provider {
        EmbeddingBackend::OpenAi => {
            if config.embedding_api_key().is_none() {
                tracing::warn!("No embedding API key configured; embedding requests will be rejected");
            }
            Arc::new(OpenAiEmbedder::new(
                &config.embeddings,
                config.embedding_api_key().map(str::to_string),
            )?)
        }
        EmbeddingBackend::Hashing => {
            tracing::info!(dimensions = config.embeddings.dimensions, "Using hashing embedder");
            Arc::new(HashingEmbedder::new(config.embeddings.dimensions))
        }
    };
    Ok(embedder)
}

/// Chat-completion client
pub fn build_llm(config: &RagConfig) -> Result<Arc<dyn LlmProvider>> {
    if config.llm.api_key.is_none() {
        tracing::warn!("No LLM API key configured; completions will be rejected");
    }
    let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiChat::new(&config.llm)?);
    Ok(llm)
}

/// Web search client, when enabled and a key is present
pub fn build_web_search(config: &RagConfig) -> Result<Option<Arc<dyn WebSearchProvider>>> {
    if !config.web_search.enabled {
        return Ok(None);
    }
    let client = SerpApiClient::from_config(&config.web_search)?;
    if client.is_none() {
        tracing::info!("Web search fallback disabled (no SerpAPI key)");
    }
    Ok(client.map(|c| Arc::new(c) as Arc<dyn WebSearchProvider>))
}
