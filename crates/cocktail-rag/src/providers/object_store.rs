//! Object store provider trait for the remote document library

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// One entry of a directory-style listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Name relative to the listed prefix
    pub name: String,
    /// Folders are listed again with `prefix/name`
    pub is_folder: bool,
    pub size: Option<u64>,
}

/// Trait for the store the library is ingested from
///
/// Implementations:
/// - `SupabaseStorage`: Supabase Storage REST API
/// - `LocalObjectStore`: a directory tree on local disk
#[async_trait]
pub trait ObjectStoreProvider: Send + Sync {
    /// One page of the entries directly under `prefix`, sorted by name
    async fn list(&self, prefix: &str, limit: usize, offset: usize) -> Result<Vec<ObjectEntry>>;

    /// Raw bytes of the object at `path`
    async fn download(&self, path: &str) -> Result<Bytes>;

    /// Publicly reachable URL for `path`, if the store has one
    fn public_url(&self, path: &str) -> Option<String>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Walk `prefix` depth-first through every page, returning full object
/// paths (folders excluded). Names starting with `.` are skipped, which
/// also drops placeholder objects some stores keep in empty folders.
pub async fn list_recursive(
    store: &dyn ObjectStoreProvider,
    prefix: &str,
    page_size: usize,
) -> Result<Vec<(String, Option<u64>)>> {
    let page_size = page_size.max(1);
    let mut files = Vec::new();
    let mut pending = vec![prefix.trim_matches('/').to_string()];

    while let Some(folder) = pending.pop() {
        let mut offset = 0;
        let mut subfolders = Vec::new();
        loop {
            let page = store.list(&folder, page_size, offset).await?;
            let fetched = page.len();

            for entry in page {
                if entry.name.is_empty() || entry.name.starts_with('.') {
                    continue;
                }
                let path = join_path(&folder, &entry.name);
                if entry.is_folder {
                    subfolders.push(path);
                } else {
                    files.push((path, entry.size));
                }
            }

            if fetched < page_size {
                break;
            }
            offset += fetched;
        }
        // reversed so folders are visited in name order
        pending.extend(subfolders.into_iter().rev());
    }

    Ok(files)
}

/// Join a prefix and a name with exactly one `/`
pub fn join_path(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let name = name.trim_start_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}
