//! Persisted set of documents that have already been ingested
//!
//! Stored as a JSON array of storage paths. The older object form
//! (`{"file.pdf": true}`) is keyed by bare filename; those entries match any
//! document with that filename until [`IngestionState::adopt_legacy`]
//! rewrites them as paths.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Deserialize)]
#[serde(untagged)]
enum StateFile {
    List(Vec<String>),
    Map(serde_json::Map<String, serde_json::Value>),
}

/// Ingestion state backed by a JSON file
#[derive(Debug)]
pub struct IngestionState {
    path: PathBuf,
    processed: BTreeSet<String>,
    /// Filenames from the object form, not yet matched to a path
    legacy: BTreeSet<String>,
}

impl IngestionState {
    /// Load from disk; a missing or unreadable file yields an empty state
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut processed = BTreeSet::new();
        let mut legacy = BTreeSet::new();
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<StateFile>(&content) {
                Ok(StateFile::List(ids)) => processed.extend(ids),
                Ok(StateFile::Map(map)) => legacy.extend(map.into_iter().map(|(name, _)| name)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Failed to parse ingestion state, starting empty: {}", e);
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), "Failed to read ingestion state, starting empty: {}", e);
            }
        }

        tracing::info!(
            path = %path.display(),
            documents = processed.len(),
            legacy = legacy.len(),
            "Loaded ingestion state"
        );
        Self { path, processed, legacy }
    }

    /// Whether the document at `path` was ingested. Legacy entries match on
    /// the filename alone.
    pub fn contains(&self, path: &str) -> bool {
        self.processed.contains(path)
            || self.legacy.contains(path)
            || self.legacy.contains(file_name(path))
    }

    pub fn len(&self) -> usize {
        self.processed.len() + self.legacy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_empty() && self.legacy.is_empty()
    }

    pub fn has_legacy(&self) -> bool {
        !self.legacy.is_empty()
    }

    /// Rewrite legacy filename entries as the listed `paths` they match,
    /// then persist in the path form. Legacy names matching no listed path
    /// are dropped. Returns how many paths were adopted.
    pub fn adopt_legacy<'a, I>(&mut self, paths: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        if self.legacy.is_empty() {
            return Ok(0);
        }

        let mut adopted = 0;
        for path in paths {
            if self.processed.contains(path) {
                continue;
            }
            if self.legacy.contains(path) || self.legacy.contains(file_name(path)) {
                self.processed.insert(path.to_string());
                adopted += 1;
            }
        }

        let dropped = self.legacy.len().saturating_sub(adopted);
        self.legacy.clear();
        tracing::info!(adopted, dropped, "Migrated legacy ingestion state");
        self.persist()?;
        Ok(adopted)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.processed.iter().map(String::as_str)
    }

    /// Record a document and persist. On a persist failure the in-memory
    /// state still contains the document and the error is returned.
    pub fn mark_ingested(&mut self, id: &str) -> Result<()> {
        self.processed.insert(id.to_string());
        self.persist()
    }

    /// Forget every document and persist the empty state
    pub fn reset(&mut self) -> Result<()> {
        self.processed.clear();
        self.legacy.clear();
        self.persist()
    }

    /// Write the state through a temp file in the same directory
    pub fn persist(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| self.io_error(e))?;

        let ids: Vec<&str> = self.ids().collect();
        let content = serde_json::to_vec_pretty(&ids)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| self.io_error(e))?;
        tmp.write_all(&content).map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;
        Ok(())
    }

    fn io_error(&self, e: std::io::Error) -> Error {
        Error::StorageIo(format!("{}: {}", self.path.display(), e))
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
