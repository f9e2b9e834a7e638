//! Embedded vector collection on SQLite
//!
//! Records, their JSON metadata and little-endian `f32` embeddings live in
//! one table keyed by `(collection, id)`. Search is a brute-force cosine
//! scan, which is plenty for a library of a few hundred thousand chunks.

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{IndexedRecord, Metadata, RetrievedChunk};

use super::{blob_to_vec, cosine_similarity, vec_to_blob};

/// Database file inside the index directory
pub const INDEX_FILE: &str = "index.sqlite3";

/// A named collection in an index directory
pub struct SqliteCollection {
    conn: Arc<Mutex<Connection>>,
    name: String,
    path: Option<PathBuf>,
}

impl SqliteCollection {
    /// Create or open the collection stored under `dir`
    pub fn open(dir: &Path, name: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let file = dir.join(INDEX_FILE);
        let conn = Connection::open(&file)
            .map_err(|e| Error::vector_db(format!("Failed to open {}: {}", file.display(), e)))?;

        let collection = Self {
            conn: Arc::new(Mutex::new(conn)),
            name: name.to_string(),
            path: Some(dir.to_path_buf()),
        };
        collection.migrate()?;
        Ok(collection)
    }

    /// Create an in-memory collection
    pub fn in_memory(name: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::vector_db(format!("Failed to open in-memory database: {}", e)))?;

        let collection = Self {
            conn: Arc::new(Mutex::new(conn)),
            name: name.to_string(),
            path: None,
        };
        collection.migrate()?;
        Ok(collection)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        // rollback journal keeps the directory self-contained for snapshot export
        conn.execute_batch(
            r#"
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;

            CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                document TEXT NOT NULL,
                metadata TEXT NOT NULL,
                embedding BLOB NOT NULL,
                dimensions INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );
            "#,
        )
        .map_err(|e| Error::vector_db(format!("Failed to migrate index: {}", e)))?;

        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory backing this collection; `None` when in memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Insert or replace by id. Replacing keeps the original insertion slot.
    pub fn upsert(&self, records: &[IndexedRecord], embeddings: &[Vec<f32>]) -> Result<()> {
        if records.len() != embeddings.len() {
            return Err(Error::vector_db(format!(
                "{} records but {} embeddings",
                records.len(),
                embeddings.len()
            )));
        }

        let now = chrono::Utc::now().to_rfc3339();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                r#"
                INSERT INTO records (collection, id, document, metadata, embedding, dimensions, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(collection, id) DO UPDATE SET
                    document = excluded.document,
                    metadata = excluded.metadata,
                    embedding = excluded.embedding,
                    dimensions = excluded.dimensions,
                    updated_at = excluded.updated_at
                "#,
            )?;
            for (record, embedding) in records.iter().zip(embeddings) {
                stmt.execute(params![
                    self.name,
                    record.id,
                    record.text,
                    serde_json::to_string(&record.metadata)?,
                    vec_to_blob(embedding),
                    embedding.len() as i64,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// The `top_k` records most similar to `embedding`; ties keep insertion order
    pub fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<RetrievedChunk>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let rows = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare_cached(
                "SELECT id, document, metadata, embedding FROM records WHERE collection = ?1 ORDER BY rowid",
            )?;
            let rows = stmt
                .query_map(params![self.name], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        let mut scored = Vec::with_capacity(rows.len());
        for (id, text, metadata, blob) in rows {
            let similarity = cosine_similarity(embedding, &blob_to_vec(&blob));
            scored.push(RetrievedChunk {
                id,
                text,
                metadata: parse_metadata(&metadata)?,
                similarity,
            });
        }

        scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        scored.truncate(top_k);
        Ok(scored)
    }

    /// Number of records in the collection
    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?1",
            params![self.name],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Every record in insertion order
    pub fn records(&self) -> Result<Vec<IndexedRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, document, metadata FROM records WHERE collection = ?1 ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map(params![self.name], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, text, metadata)| {
                Ok(IndexedRecord {
                    id,
                    text,
                    metadata: parse_metadata(&metadata)?,
                })
            })
            .collect()
    }

    /// Fetch one record by id
    pub fn get(&self, id: &str) -> Result<Option<IndexedRecord>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT document, metadata FROM records WHERE collection = ?1 AND id = ?2",
                params![self.name, id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        row.map(|(text, metadata)| {
            Ok(IndexedRecord {
                id: id.to_string(),
                text,
                metadata: parse_metadata(&metadata)?,
            })
        })
        .transpose()
    }

    /// Replace a record's metadata, leaving text and embedding untouched
    pub fn update_metadata(&self, id: &str, metadata: &Metadata) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE records SET metadata = ?1, updated_at = ?2 WHERE collection = ?3 AND id = ?4",
            params![
                serde_json::to_string(metadata)?,
                chrono::Utc::now().to_rfc3339(),
                self.name,
                id
            ],
        )?;
        Ok(changed > 0)
    }
}

fn parse_metadata(raw: &str) -> Result<Metadata> {
    serde_json::from_str(raw)
        .map_err(|e| Error::vector_db(format!("Corrupt record metadata: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn record(id: &str, text: &str, chunk: u64) -> IndexedRecord {
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), Value::from("specs.pdf"));
        metadata.insert("chunk".to_string(), Value::from(chunk));
        IndexedRecord {
            id: id.to_string(),
            text: text.to_string(),
            metadata,
        }
    }

    #[test]
    fn test_upsert_replaces_by_id() {
        let collection = SqliteCollection::in_memory("test").unwrap();
        collection
            .upsert(&[record("doc_0", "first", 0)], &[vec![1.0, 0.0]])
            .unwrap();
        collection
            .upsert(&[record("doc_0", "second", 0)], &[vec![0.0, 1.0]])
            .unwrap();

        assert_eq!(collection.count().unwrap(), 1);
        assert_eq!(collection.get("doc_0").unwrap().unwrap().text, "second");
    }

    #[test]
    fn test_query_orders_by_similarity() {
        let collection = SqliteCollection::in_memory("test").unwrap();
        collection
            .upsert(
                &[
                    record("a", "orthogonal", 0),
                    record("b", "exact", 1),
                    record("c", "close", 2),
                ],
                &[vec![0.0, 1.0], vec![1.0, 0.0], vec![0.9, 0.1]],
            )
            .unwrap();

        let results = collection.query(&[1.0, 0.0], 2).unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(results[0].chunk_ordinal(), Some(1));
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let collection = SqliteCollection::in_memory("test").unwrap();
        collection
            .upsert(
                &[record("z", "one", 0), record("a", "two", 1)],
                &[vec![1.0, 0.0], vec![1.0, 0.0]],
            )
            .unwrap();

        let results = collection.query(&[1.0, 0.0], 5).unwrap();
        assert_eq!(results[0].id, "z");
        assert_eq!(results[1].id, "a");
    }

    #[test]
    fn test_collections_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let a = SqliteCollection::open(dir.path(), "a").unwrap();
        a.upsert(&[record("x", "t", 0)], &[vec![1.0]]).unwrap();

        let b = SqliteCollection::open(dir.path(), "b").unwrap();
        assert_eq!(b.count().unwrap(), 0);
        assert_eq!(a.count().unwrap(), 1);
    }

    #[test]
    fn test_update_metadata() {
        let collection = SqliteCollection::in_memory("test").unwrap();
        collection.upsert(&[record("x", "t", 0)], &[vec![1.0]]).unwrap();

        let mut metadata = collection.get("x").unwrap().unwrap().metadata;
        metadata.insert("flavour".to_string(), Value::from("citrus"));
        assert!(collection.update_metadata("x", &metadata).unwrap());
        assert!(!collection.update_metadata("missing", &metadata).unwrap());

        let records = collection.records().unwrap();
        assert_eq!(records[0].metadata["flavour"], "citrus");
    }

    #[test]
    fn test_mismatched_lengths() {
        let collection = SqliteCollection::in_memory("test").unwrap();
        let err = collection.upsert(&[record("x", "t", 0)], &[]).unwrap_err();
        assert!(matches!(err, Error::VectorDb(_)));
    }
}
