//! Ingestion coordinator: brings the vector index up to date with storage
//!
//! Each run lists the remote library, skips documents already recorded in
//! the ingestion state, and pushes the rest through
//! download -> extract -> clean -> chunk -> tag -> upsert -> mark.
//! A failing document is reported and the run moves on.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::providers::{list_recursive, ObjectStoreProvider, VectorStoreProvider};
use crate::types::{
    FileType, IndexedRecord, IngestFailure, IngestReport, RemoteDocument, RetagReport,
};

use super::chunker::TextChunker;
use super::extractor::{ExtractedText, TextExtractor};
use super::state::IngestionState;
use super::tagging::ChunkTagger;

/// Coordinates ingestion runs against one object store and one index
pub struct IngestCoordinator {
    store: Arc<dyn ObjectStoreProvider>,
    index: Arc<dyn VectorStoreProvider>,
    tagger: ChunkTagger,
    /// Held for a whole run so concurrent runs serialize
    state: Mutex<IngestionState>,
    chunker: TextChunker,
    tag_on_ingest: bool,
    prefix: String,
    page_size: usize,
    batch_size: usize,
    extensions: Vec<String>,
}

impl IngestCoordinator {
    pub fn new(
        store: Arc<dyn ObjectStoreProvider>,
        index: Arc<dyn VectorStoreProvider>,
        tagger: ChunkTagger,
        state: IngestionState,
        config: &RagConfig,
    ) -> Self {
        Self {
            store,
            index,
            tagger,
            state: Mutex::new(state),
            chunker: TextChunker::new(&config.chunking),
            tag_on_ingest: config.ingestion.tagging,
            prefix: config.storage.prefix.clone(),
            page_size: config.storage.page_size,
            batch_size: config.vector_db.upsert_batch_size.max(1),
            extensions: config
                .ingestion
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// Every supported document under the configured prefix
    pub async fn list_documents(&self) -> Result<Vec<RemoteDocument>> {
        let files = list_recursive(self.store.as_ref(), &self.prefix, self.page_size).await?;

        let documents: Vec<RemoteDocument> = files
            .into_iter()
            .filter(|(path, _)| self.accepts(path))
            .map(|(path, size)| {
                let url = self.store.public_url(&path);
                RemoteDocument::new(path).with_size(size).with_public_url(url)
            })
            .collect();

        tracing::debug!(
            store = self.store.name(),
            prefix = %self.prefix,
            documents = documents.len(),
            "Listed library"
        );
        Ok(documents)
    }

    /// Configured extension with an extractor behind it
    fn accepts(&self, path: &str) -> bool {
        if !FileType::from_path(path).is_supported() {
            return false;
        }
        path.rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|e| *e == ext))
    }

    /// Remote documents not yet recorded in the ingestion state
    pub async fn pending_documents(&self) -> Result<Vec<RemoteDocument>> {
        let documents = self.list_documents().await?;
        let state = self.state.lock().await;
        Ok(documents
            .into_iter()
            .filter(|d| !state.contains(&d.path))
            .collect())
    }

    /// Number of documents recorded as ingested
    pub async fn ingested_count(&self) -> usize {
        self.state.lock().await.len()
    }

    /// Run one ingestion pass
    pub async fn run_once(&self) -> Result<IngestReport> {
        let started = Instant::now();
        let mut state = self.state.lock().await;

        let documents = self.list_documents().await?;
        if state.has_legacy() {
            if let Err(e) = state.adopt_legacy(documents.iter().map(|d| d.path.as_str())) {
                tracing::error!(error = %e, "Failed to persist migrated ingestion state");
            }
        }
        tracing::info!("Ingestion run: {} documents in library, {} already ingested", documents.len(), state.len());

        let mut report = IngestReport {
            discovered: documents.len(),
            ..Default::default()
        };

        for doc in &documents {
            if state.contains(&doc.path) {
                report.skipped += 1;
                continue;
            }

            match self.ingest_document(doc).await {
                Ok(0) => {
                    tracing::warn!(path = %doc.path, "No chunks produced; will retry next run");
                    report.empty.push(doc.path.clone());
                }
                Ok(chunks) => {
                    report.ingested += 1;
                    report.chunks_indexed += chunks;
                    if let Err(e) = state.mark_ingested(&doc.path) {
                        tracing::error!(path = %doc.path, error = %e, "Failed to persist ingestion state");
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to ingest {}: {}", doc.path, e);
                    report.failed.push(IngestFailure {
                        path: doc.path.clone(),
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        report.count = match self.index.count().await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "Could not count index after ingestion");
                0
            }
        };
        report.status = if report.failed.is_empty() { "ok" } else { "partial" }.to_string();
        report.duration_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            ingested = report.ingested,
            skipped = report.skipped,
            failed = report.failed.len(),
            empty = report.empty.len(),
            chunks = report.chunks_indexed,
            count = report.count,
            duration_ms = report.duration_ms,
            "Ingestion run finished"
        );
        Ok(report)
    }

    /// Fetch, extract, chunk and index one document; returns the chunk count
    async fn ingest_document(&self, doc: &RemoteDocument) -> Result<usize> {
        tracing::info!(path = %doc.path, file_type = doc.file_type.display_name(), "Ingesting document");

        let bytes = self.store.download(&doc.path).await?;
        let content_hash = hex::encode(Sha256::digest(&bytes));

        let filename = doc.filename.clone();
        let file_type = doc.file_type;
        let extracted = tokio::task::spawn_blocking(move || {
            TextExtractor::extract(&filename, file_type, &bytes).map(ExtractedText::cleaned)
        })
        .await
        .map_err(|e| Error::internal(format!("extraction task failed: {}", e)))??;
        if extracted.is_empty() {
            return Ok(0);
        }

        let chunks = self.chunker.chunk_document(doc, &extracted);
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut records = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let mut record = IndexedRecord::from_chunk(chunk, &content_hash, doc.public_url.as_deref());
            if self.tag_on_ingest {
                let tags = self.tagger.tag_or_empty(&record.id, &record.text).await;
                record.metadata.extend(tags);
            }
            records.push(record);
        }

        for batch in records.chunks(self.batch_size) {
            self.index.upsert(batch).await?;
        }

        tracing::info!(path = %doc.path, chunks = chunks.len(), "Indexed document");
        Ok(chunks.len())
    }

    /// Re-tag every indexed record, merging fresh tags into its metadata
    pub async fn retag_all(&self) -> Result<RetagReport> {
        let records = self.index.records().await?;
        let mut report = RetagReport {
            total: records.len(),
            ..Default::default()
        };
        tracing::info!("Retagging {} chunks", records.len());

        for record in records {
            let tags = match self.tagger.tag(&record.text).await {
                Ok(tags) => tags,
                Err(e) => {
                    tracing::warn!(id = %record.id, error = %e, "Retagging failed");
                    report.failed += 1;
                    continue;
                }
            };

            let mut metadata = record.metadata;
            metadata.extend(tags);
            match self.index.update_metadata(&record.id, &metadata).await {
                Ok(true) => report.updated += 1,
                Ok(false) => {
                    tracing::warn!(id = %record.id, "Record disappeared during retagging");
                    report.failed += 1;
                }
                Err(e) => {
                    tracing::warn!(id = %record.id, error = %e, "Failed to update metadata");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(updated = report.updated, failed = report.failed, "Retagging finished");
        Ok(report)
    }

    /// Forget every ingested document; returns how many were cleared
    pub async fn reset_state(&self) -> Result<usize> {
        let mut state = self.state.lock().await;
        let cleared = state.len();
        state.reset()?;
        tracing::warn!(cleared, path = %state.path().display(), "Ingestion state reset");
        Ok(cleared)
    }
}
