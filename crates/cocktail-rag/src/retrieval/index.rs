//! Async vector index handle over a swappable SQLite collection

use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::VectorDbConfig;
use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, VectorStoreProvider};
use crate::types::{IndexedRecord, Metadata, RetrievedChunk};

use super::collection::SqliteCollection;

/// Vector index shared by the ingestion coordinator and the answerer
///
/// Readers clone the current collection handle and work on it off the
/// runtime; [`VectorIndex::reopen_with`] swaps in a fresh handle once the
/// directory has been replaced.
pub struct VectorIndex {
    collection: RwLock<Arc<SqliteCollection>>,
    embedder: Arc<dyn EmbeddingProvider>,
    name: String,
    path: Option<PathBuf>,
}

impl VectorIndex {
    /// Open (or create) the persistent index described by `config`
    pub fn open(config: &VectorDbConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let collection = SqliteCollection::open(&config.storage_path, &config.collection)?;
        tracing::info!(
            path = %config.storage_path.display(),
            collection = %config.collection,
            "Opened vector index"
        );

        Ok(Self {
            collection: RwLock::new(Arc::new(collection)),
            embedder,
            name: config.collection.clone(),
            path: Some(config.storage_path.clone()),
        })
    }

    /// Non-persistent index
    pub fn in_memory(name: &str, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        Ok(Self {
            collection: RwLock::new(Arc::new(SqliteCollection::in_memory(name)?)),
            embedder,
            name: name.to_string(),
            path: None,
        })
    }

    /// Directory backing the index, if persistent
    pub fn storage_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn collection_name(&self) -> &str {
        &self.name
    }

    fn current(&self) -> Arc<SqliteCollection> {
        self.collection.read().clone()
    }

    /// Release the index directory, let `replace` rewrite it, then reopen.
    ///
    /// The directory is reopened even when `replace` fails so the index is
    /// never left detached. Returns the record count after reopening.
    pub fn reopen_with<F>(&self, replace: F) -> Result<usize>
    where
        F: FnOnce(&Path) -> Result<()>,
    {
        let path = self
            .path
            .clone()
            .ok_or_else(|| Error::Snapshot("in-memory index cannot be reopened".to_string()))?;

        let mut slot = self.collection.write();
        *slot = Arc::new(SqliteCollection::in_memory(&self.name)?);

        let outcome = replace(&path);
        match SqliteCollection::open(&path, &self.name) {
            Ok(collection) => *slot = Arc::new(collection),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to reopen vector index");
                return Err(e);
            }
        }
        outcome?;

        let count = slot.count()?;
        tracing::info!(path = %path.display(), count, "Vector index reopened");
        Ok(count)
    }

    /// Reopen the directory as-is
    pub fn reopen(&self) -> Result<usize> {
        self.reopen_with(|_| Ok(()))
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&SqliteCollection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let collection = self.current();
        tokio::task::spawn_blocking(move || op(&collection))
            .await
            .map_err(|e| Error::internal(format!("index task failed: {}", e)))?
    }
}

#[async_trait]
impl VectorStoreProvider for VectorIndex {
    async fn upsert(&self, records: &[IndexedRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        let records = records.to_vec();
        self.blocking(move |collection| collection.upsert(&records, &embeddings))
            .await
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        let embedding = self
            .embedder
            .embed(text)
            .await
            .map_err(|e| Error::RetrievalFailed(e.to_string()))?;

        self.blocking(move |collection| collection.query(&embedding, top_k))
            .await
            .map_err(|e| match e {
                Error::RetrievalFailed(_) => e,
                other => Error::RetrievalFailed(other.to_string()),
            })
    }

    async fn count(&self) -> Result<usize> {
        self.blocking(|collection| collection.count()).await
    }

    async fn records(&self) -> Result<Vec<IndexedRecord>> {
        self.blocking(|collection| collection.records()).await
    }

    async fn update_metadata(&self, id: &str, metadata: &Metadata) -> Result<bool> {
        let id = id.to_string();
        let metadata = metadata.clone();
        self.blocking(move |collection| collection.update_metadata(&id, &metadata))
            .await
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::HashingEmbedder;
    use serde_json::Value;

    fn embedder() -> Arc<dyn EmbeddingProvider> {
        Arc::new(HashingEmbedder::new(64))
    }

    fn record(id: &str, text: &str) -> IndexedRecord {
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), Value::from("bar-manual.pdf"));
        IndexedRecord {
            id: id.to_string(),
            text: text.to_string(),
            metadata,
        }
    }

    fn config(dir: &Path) -> VectorDbConfig {
        VectorDbConfig {
            storage_path: dir.join("index"),
            collection: "test".to_string(),
            upsert_batch_size: 10,
        }
    }

    #[tokio::test]
    async fn test_query_finds_matching_text() {
        let index = VectorIndex::in_memory("test", embedder()).unwrap();
        index
            .upsert(&[
                record("a", "clarified milk punch with citrus and whey"),
                record("b", "pressure calibration for espresso machines"),
            ])
            .await
            .unwrap();

        let results = index.query("milk punch whey", 1).await.unwrap();
        assert_eq!(results[0].id, "a");
        assert_eq!(index.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_persists_across_open() {
        let dir = tempfile::tempdir().unwrap();
        {
            let index = VectorIndex::open(&config(dir.path()), embedder()).unwrap();
            index.upsert(&[record("a", "negroni")]).await.unwrap();
        }

        let index = VectorIndex::open(&config(dir.path()), embedder()).unwrap();
        assert_eq!(index.count().await.unwrap(), 1);
        assert_eq!(index.records().await.unwrap()[0].text, "negroni");
    }

    #[tokio::test]
    async fn test_reopen_with_replaced_directory() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::open(&config(dir.path()), embedder()).unwrap();
        index.upsert(&[record("a", "negroni")]).await.unwrap();

        let count = index
            .reopen_with(|path| {
                std::fs::remove_dir_all(path)?;
                std::fs::create_dir_all(path)?;
                Ok(())
            })
            .unwrap();

        assert_eq!(count, 0);
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reopen_after_failed_replace() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::open(&config(dir.path()), embedder()).unwrap();
        index.upsert(&[record("a", "negroni")]).await.unwrap();

        let err = index
            .reopen_with(|_| Err(Error::Snapshot("bad archive".to_string())))
            .unwrap_err();
        assert!(matches!(err, Error::Snapshot(_)));
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[test]
    fn test_in_memory_cannot_reopen() {
        let index = VectorIndex::in_memory("test", embedder()).unwrap();
        assert!(index.reopen().is_err());
    }
}
