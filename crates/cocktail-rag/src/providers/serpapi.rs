//! SerpAPI web search client (Google engine)

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::WebSearchConfig;
use crate::error::{Error, Result};

use super::web_search::{WebResult, WebSearchProvider};

/// SerpAPI client
pub struct SerpApiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    /// Usually a string, occasionally a list of fragments
    #[serde(default)]
    snippet: serde_json::Value,
}

impl OrganicResult {
    fn into_result(self) -> Option<WebResult> {
        if self.link.is_empty() && self.title.is_empty() {
            return None;
        }
        let snippet = match self.snippet {
            serde_json::Value::String(s) => s,
            serde_json::Value::Array(parts) => parts
                .iter()
                .filter_map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            _ => String::new(),
        };
        Some(WebResult {
            title: self.title.trim().to_string(),
            link: self.link,
            snippet: snippet.trim().to_string(),
        })
    }
}

impl SerpApiClient {
    /// Returns `None` when no API key is configured
    pub fn from_config(config: &WebSearchConfig) -> Result<Option<Self>> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Some(Self {
            client,
            base_url: config.base_url.clone(),
            api_key,
        }))
    }
}

#[async_trait]
impl WebSearchProvider for SerpApiClient {
    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<WebResult>> {
        let num = num_results.clamp(1, 10);
        let num_param = num.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("num", num_param.as_str()),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::WebSearch(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::WebSearch(format!("API error {}", status)));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::WebSearch(format!("invalid response: {}", e)))?;
        if let Some(error) = parsed.error {
            return Err(Error::WebSearch(error));
        }

        Ok(parsed
            .organic_results
            .into_iter()
            .filter_map(OrganicResult::into_result)
            .take(num)
            .collect())
    }

    fn name(&self) -> &str {
        "serpapi"
    }
}
