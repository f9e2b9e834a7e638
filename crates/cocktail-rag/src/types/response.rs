//! Request and response types for the HTTP API

use serde::{Deserialize, Serialize};

use super::conversation::ConversationTurn;

/// POST /ask body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
}

/// Where a citation points
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceOrigin {
    /// A chunk of the indexed library
    Corpus,
    /// An external web search result
    Web,
}

/// A source reference attached to an answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Citation {
    /// Display label, e.g. `Liquid Intelligence.pdf (chunks 3, 7)`
    pub label: String,
    /// Filename (corpus) or page title (web)
    pub source: String,
    /// Chunk ordinals backing this citation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chunks: Vec<usize>,
    /// Public document URL or web link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Web snippet
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    pub origin: SourceOrigin,
}

/// What the prompt context was built from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContextOrigin {
    Corpus,
    Web,
    /// Nothing usable was found
    Empty,
    /// No retrieval happened (empty question)
    Skipped,
}

/// Result of answering one question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// Model answer with the citation block appended
    pub text: String,
    pub citations: Vec<Citation>,
    pub context: ContextOrigin,
}

/// POST /ask response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub response: String,
    pub sources: Vec<Citation>,
    pub context: ContextOrigin,
}

impl From<Answer> for AskResponse {
    fn from(answer: Answer) -> Self {
        Self {
            response: answer.text,
            sources: answer.citations,
            context: answer.context,
        }
    }
}

/// GET /health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chroma_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthResponse {
    pub fn ok(count: usize) -> Self {
        Self {
            status: "ok".to_string(),
            chroma_count: Some(count),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            chroma_count: None,
            message: Some(message.into()),
        }
    }
}

/// A document that failed during an ingestion run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestFailure {
    pub path: String,
    pub kind: String,
    pub message: String,
}

/// Summary of one ingestion run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    pub status: String,
    /// Supported files found in storage
    pub discovered: usize,
    /// Already in the ingestion state
    pub skipped: usize,
    /// Newly indexed documents
    pub ingested: usize,
    /// Documents that produced no chunks
    pub empty: Vec<String>,
    pub failed: Vec<IngestFailure>,
    pub chunks_indexed: usize,
    /// Index size after the run
    pub count: usize,
    pub duration_ms: u64,
}

/// Summary of a retagging pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetagReport {
    pub total: usize,
    pub updated: usize,
    pub failed: usize,
}

/// GET /ingestion/pending response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingResponse {
    pub count: usize,
    pub pending: Vec<String>,
}
