//! Test doubles for the provider traits

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::types::{ChatMessage, IndexedRecord, Metadata, RetrievedChunk};

use super::llm::LlmProvider;
use super::vector_store::VectorStoreProvider;
use super::web_search::{WebResult, WebSearchProvider};

/// LLM that returns a fixed reply (or fails) and records every prompt
pub struct ScriptedLlm {
    reply: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlm {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.prompts.lock().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn complete(&self, messages: &[ChatMessage], _temperature: f32) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(messages.to_vec());
        self.reply
            .clone()
            .ok_or_else(|| Error::completion("scripted failure"))
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }
}

/// Vector store returning a fixed result list, or failing every query
pub struct StaticIndex {
    results: Option<Vec<RetrievedChunk>>,
}

impl StaticIndex {
    pub fn with_results(results: Vec<RetrievedChunk>) -> Self {
        Self { results: Some(results) }
    }

    pub fn failing() -> Self {
        Self { results: None }
    }
}

#[async_trait]
impl VectorStoreProvider for StaticIndex {
    async fn upsert(&self, _records: &[IndexedRecord]) -> Result<()> {
        Ok(())
    }

    async fn query(&self, _text: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        match &self.results {
            Some(results) => Ok(results.iter().take(top_k).cloned().collect()),
            None => Err(Error::RetrievalFailed("index unavailable".to_string())),
        }
    }

    async fn count(&self) -> Result<usize> {
        self.results
            .as_ref()
            .map(Vec::len)
            .ok_or_else(|| Error::RetrievalFailed("index unavailable".to_string()))
    }

    async fn records(&self) -> Result<Vec<IndexedRecord>> {
        Ok(Vec::new())
    }

    async fn update_metadata(&self, _id: &str, _metadata: &Metadata) -> Result<bool> {
        Ok(false)
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Web search returning fixed results (or failing) and counting calls
pub struct StaticWebSearch {
    results: Option<Vec<WebResult>>,
    calls: AtomicUsize,
}

impl StaticWebSearch {
    pub fn with_results(results: Vec<WebResult>) -> Self {
        Self { results: Some(results), calls: AtomicUsize::new(0) }
    }

    pub fn failing() -> Self {
        Self { results: None, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebSearchProvider for StaticWebSearch {
    async fn search(&self, _query: &str, num_results: usize) -> Result<Vec<WebResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.results {
            Some(results) => Ok(results.iter().take(num_results).cloned().collect()),
            None => Err(Error::WebSearch("search unavailable".to_string())),
        }
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// A retrieved chunk with the canonical metadata keys
pub fn retrieved(source: &str, chunk: usize, text: &str) -> RetrievedChunk {
    let mut metadata = Metadata::new();
    metadata.insert(crate::types::META_SOURCE.to_string(), source.into());
    metadata.insert(crate::types::META_CHUNK.to_string(), (chunk as u64).into());
    RetrievedChunk {
        id: format!("{}_{}", source, chunk),
        text: text.to_string(),
        metadata,
        similarity: 0.9,
    }
}
