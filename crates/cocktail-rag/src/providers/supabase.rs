//! Supabase Storage client
//!
//! Uses the Storage REST API directly:
//! - `POST /storage/v1/object/list/{bucket}` for paginated listings
//! - `GET /storage/v1/object/{bucket}/{path}` for authenticated downloads
//! - `/storage/v1/object/public/{bucket}/{path}` for public links

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::StorageConfig;
use crate::error::{Error, Result};

use super::object_store::{ObjectEntry, ObjectStoreProvider};

/// Supabase Storage bucket client
pub struct SupabaseStorage {
    client: Client,
    base_url: Url,
    bucket: String,
    service_key: Option<String>,
}

#[derive(Serialize)]
struct ListRequest<'a> {
    prefix: &'a str,
    limit: usize,
    offset: usize,
    #[serde(rename = "sortBy")]
    sort_by: SortBy,
}

#[derive(Serialize)]
struct SortBy {
    column: &'static str,
    order: &'static str,
}

#[derive(Deserialize)]
struct ListedObject {
    name: String,
    /// Folders come back without an id
    id: Option<String>,
    metadata: Option<ObjectMetadata>,
}

#[derive(Deserialize)]
struct ObjectMetadata {
    size: Option<u64>,
}

impl SupabaseStorage {
    /// Create a client for the configured project and bucket
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let base_url = Url::parse(&config.url)
            .map_err(|e| Error::Config(format!("Invalid Supabase URL '{}': {}", config.url, e)))?;
        if config.service_key.is_none() {
            tracing::warn!("No Supabase service key configured; only public buckets will be readable");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            bucket: config.bucket.clone(),
            service_key: config.service_key.clone(),
        })
    }

    /// `{base}/storage/v1/object/{kind...}/{bucket}/{path}` with each path
    /// segment percent-encoded
    fn object_url(&self, kind: &[&str], path: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::Config("Supabase URL cannot be a base URL".to_string()))?;
            segments.pop_if_empty().extend(["storage", "v1", "object"]);
            segments.extend(kind);
            segments.push(&self.bucket);
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
        }
        Ok(url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.service_key {
            Some(key) => request.bearer_auth(key).header("apikey", key),
            None => request,
        }
    }
}

#[async_trait]
impl ObjectStoreProvider for SupabaseStorage {
    async fn list(&self, prefix: &str, limit: usize, offset: usize) -> Result<Vec<ObjectEntry>> {
        let url = self.object_url(&["list"], "")?;
        let body = ListRequest {
            prefix,
            limit,
            offset,
            sort_by: SortBy { column: "name", order: "asc" },
        };

        let response = self.authorized(self.client.post(url).json(&body)).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::object_store(format!(
                "list '{}' failed with {}: {}",
                prefix, status, text
            )));
        }

        let objects: Vec<ListedObject> = response.json().await?;
        Ok(objects
            .into_iter()
            .map(|o| ObjectEntry {
                is_folder: o.id.is_none(),
                size: o.metadata.and_then(|m| m.size),
                name: o.name,
            })
            .collect())
    }

    async fn download(&self, path: &str) -> Result<Bytes> {
        let url = self.object_url(&[], path)?;
        let response = self.authorized(self.client.get(url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::object_store(format!("download '{}' failed with {}", path, status)));
        }
        Ok(response.bytes().await?)
    }

    fn public_url(&self, path: &str) -> Option<String> {
        self.object_url(&["public"], path).ok().map(String::from)
    }

    fn name(&self) -> &str {
        "supabase"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> SupabaseStorage {
        SupabaseStorage::new(&StorageConfig {
            url: "https://abc.supabase.co".to_string(),
            bucket: "cocktail-docs".to_string(),
            ..StorageConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_public_url_encodes_segments() {
        assert_eq!(
            storage().public_url("pdfs/Liquid Intelligence.pdf").unwrap(),
            "https://abc.supabase.co/storage/v1/object/public/cocktail-docs/pdfs/Liquid%20Intelligence.pdf"
        );
    }

    #[test]
    fn test_list_url() {
        let url = storage().object_url(&["list"], "").unwrap();
        assert_eq!(url.as_str(), "https://abc.supabase.co/storage/v1/object/list/cocktail-docs");
    }

    #[test]
    fn test_invalid_url() {
        let config = StorageConfig {
            url: "not a url".to_string(),
            ..StorageConfig::default()
        };
        assert!(matches!(SupabaseStorage::new(&config), Err(Error::Config(_))));
    }
}
