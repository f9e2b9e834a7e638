//! Web search provider trait, used when the library has nothing relevant

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One organic search result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

/// Trait for web search backends
///
/// Implementations:
/// - `SerpApiClient`: SerpAPI Google engine
#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    /// Search the web, returning at most `num_results` results
    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<WebResult>>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
