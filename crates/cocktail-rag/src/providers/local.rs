//! Local directory object store
//!
//! Serves a directory tree with the same listing semantics as the remote
//! store, for development and offline ingestion.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

use super::object_store::{ObjectEntry, ObjectStoreProvider};

/// Object store backed by a local directory
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a store path under the root, refusing `..` and absolute paths
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(Error::object_store(format!("invalid object path '{}'", path)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStoreProvider for LocalObjectStore {
    async fn list(&self, prefix: &str, limit: usize, offset: usize) -> Result<Vec<ObjectEntry>> {
        let dir = self.resolve(prefix)?;
        let mut entries = Vec::new();

        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::object_store(format!("{}: {}", dir.display(), e))),
        };

        while let Some(entry) = read_dir.next_entry().await? {
            let metadata = entry.metadata().await?;
            entries.push(ObjectEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_folder: metadata.is_dir(),
                size: metadata.is_file().then(|| metadata.len()),
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries.into_iter().skip(offset).take(limit).collect())
    }

    async fn download(&self, path: &str) -> Result<Bytes> {
        let file = self.resolve(path)?;
        tokio::fs::read(&file)
            .await
            .map(Bytes::from)
            .map_err(|e| Error::object_store(format!("download '{}' failed: {}", path, e)))
    }

    fn public_url(&self, _path: &str) -> Option<String> {
        None
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::object_store::list_recursive;

    fn library() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("pdfs/books")).unwrap();
        std::fs::write(root.join("pdfs/a.pdf"), b"a").unwrap();
        std::fs::write(root.join("pdfs/b.csv"), b"b").unwrap();
        std::fs::write(root.join("pdfs/.emptyFolderPlaceholder"), b"").unwrap();
        std::fs::write(root.join("pdfs/books/c.epub"), b"c").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_list_pages() {
        let dir = library();
        let store = LocalObjectStore::new(dir.path());

        let first = store.list("pdfs", 2, 0).await.unwrap();
        let second = store.list("pdfs", 2, 2).await.unwrap();
        let names: Vec<_> = first.iter().chain(second.iter()).map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec![".emptyFolderPlaceholder", "a.pdf", "b.csv", "books"]);
        assert!(second.iter().any(|e| e.name == "books" && e.is_folder));
    }

    #[tokio::test]
    async fn test_list_recursive_small_pages() {
        let dir = library();
        let store = LocalObjectStore::new(dir.path());

        let files = list_recursive(&store, "pdfs/", 1).await.unwrap();
        let paths: Vec<_> = files.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["pdfs/a.pdf", "pdfs/b.csv", "pdfs/books/c.epub"]);
        assert_eq!(files[0].1, Some(1));
    }

    #[tokio::test]
    async fn test_missing_prefix_is_empty() {
        let dir = library();
        let store = LocalObjectStore::new(dir.path());
        assert!(store.list("nope", 10, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_parent_paths() {
        let dir = library();
        let store = LocalObjectStore::new(dir.path());
        assert!(store.download("../secret").await.is_err());
        assert_eq!(&store.download("pdfs/a.pdf").await.unwrap()[..], b"a");
    }
}
