//! Vector store provider trait for chunk storage and similarity search

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{IndexedRecord, Metadata, RetrievedChunk};

/// Trait for the vector index
///
/// Implementations:
/// - `VectorIndex`: embedded SQLite collection with brute-force cosine search
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Insert or replace records by id; texts are embedded on the way in
    async fn upsert(&self, records: &[IndexedRecord]) -> Result<()>;

    /// Embed `text` and return the `top_k` most similar records
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<RetrievedChunk>>;

    /// Number of stored records
    async fn count(&self) -> Result<usize>;

    /// Every stored record, in insertion order
    async fn records(&self) -> Result<Vec<IndexedRecord>>;

    /// Replace a record's metadata; returns false when the id is unknown
    async fn update_metadata(&self, id: &str, metadata: &Metadata) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
