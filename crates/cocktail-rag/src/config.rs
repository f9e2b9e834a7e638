//! Configuration for the cocktail RAG system
//!
//! Loaded from an optional TOML file, then overlaid with environment
//! variables so deployments can keep secrets out of the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main RAG system configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Remote document storage
    pub storage: StorageConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Chat-completion configuration
    pub llm: LlmConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Vector database configuration
    pub vector_db: VectorDbConfig,
    /// Ingestion coordinator configuration
    pub ingestion: IngestionConfig,
    /// Answer generation configuration
    pub answer: AnswerConfig,
    /// Web search fallback configuration
    pub web_search: WebSearchConfig,
    /// Index snapshot export/restore configuration
    pub snapshot: SnapshotConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Enable CORS for any origin
    pub enable_cors: bool,
    /// Maximum upload size in bytes (snapshot uploads)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            max_upload_size: 1024 * 1024 * 1024, // 1GB
        }
    }
}

/// Where source documents live
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Supabase Storage REST API
    #[default]
    Supabase,
    /// A local directory tree (development)
    Local,
}

/// Remote document storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Supabase project URL
    pub url: String,
    /// Supabase service role key
    pub service_key: Option<String>,
    /// Bucket name
    pub bucket: String,
    /// Prefix (folder) to ingest from
    pub prefix: String,
    /// Root directory for the local backend
    pub local_root: PathBuf,
    /// Page size for paginated listing
    pub page_size: usize,
    /// HTTP timeout
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Supabase,
            url: String::new(),
            service_key: None,
            bucket: "cocktail-docs".to_string(),
            prefix: "pdfs".to_string(),
            local_root: PathBuf::from("./library"),
            page_size: 100,
            timeout_secs: 120,
        }
    }
}

/// Embedding backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// OpenAI-compatible `/embeddings` endpoint
    #[default]
    OpenAi,
    /// Offline feature-hashing embedder
    Hashing,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingBackend,
    /// API base URL
    pub base_url: String,
    /// API key (falls back to `llm.api_key`)
    pub api_key: Option<String>,
    /// Model name
    pub model: String,
    /// Vector dimensions
    pub dimensions: usize,
    /// Texts per embeddings request
    pub batch_size: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::OpenAi,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            batch_size: 64,
            timeout_secs: 60,
        }
    }
}

/// Chat-completion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API base URL (OpenAI-compatible)
    pub base_url: String,
    /// API key
    pub api_key: Option<String>,
    /// Model for answers and tagging
    pub model: String,
    /// Temperature for answers
    pub temperature: f32,
    /// Temperature for semantic tagging
    pub tagging_temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4-turbo".to_string(),
            temperature: 0.3,
            tagging_temperature: 0.2,
            timeout_secs: 120,
        }
    }
}

/// Chunking configuration (all sizes in estimated tokens, 4 chars each)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Budget for a single chunk
    pub max_tokens: usize,
    /// Chunks below this are dropped
    pub min_tokens: usize,
    /// Chunks above this are dropped (one oversized line can exceed `max_tokens`)
    pub hard_max_tokens: usize,
    /// Starting row count for table batching
    pub table_rows_per_chunk: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 300,
            min_tokens: 8,
            hard_max_tokens: 4000,
            table_rows_per_chunk: 10,
        }
    }
}

/// Vector database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Directory holding the index files
    pub storage_path: PathBuf,
    /// Collection name
    pub collection: String,
    /// Records per upsert call
    pub upsert_batch_size: usize,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            storage_path: default_data_dir().join("index"),
            collection: "cocktailgpt".to_string(),
            upsert_batch_size: 100,
        }
    }
}

/// Ingestion coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Ingestion state file (JSON array of processed paths)
    pub state_path: PathBuf,
    /// File extensions to ingest
    pub extensions: Vec<String>,
    /// Ask the LLM for semantic tags on each chunk
    pub tagging: bool,
    /// Run one ingestion pass when the server starts
    pub run_on_startup: bool,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            state_path: default_data_dir().join("ingested_files.json"),
            extensions: vec!["pdf".to_string(), "csv".to_string(), "epub".to_string()],
            tagging: false,
            run_on_startup: false,
        }
    }
}

/// Answer generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerConfig {
    /// Chunks retrieved per question
    pub top_k: usize,
    /// Prior conversation turns forwarded to the model
    pub history_turns: usize,
    /// Citation cap
    pub max_citations: usize,
    /// Corpus context shorter than this triggers the web fallback
    pub min_context_chars: usize,
    /// System instruction
    pub system_prompt: String,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            history_turns: 8,
            max_citations: 10,
            min_context_chars: 200,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Default system instruction for answers
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a doctoral-level expert in beverage and flavour science, \
supporting bartenders, chefs, and creators. Use the provided context, drawn from technical documents \
and training materials, to answer the question clearly, accurately, and with practical application. \
When useful, explain the science or give step-by-step recommendations. If the context is marked as \
external web content, treat it as lower trust and say so when it matters.";

/// Web search fallback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSearchConfig {
    /// Use web search when the corpus has nothing useful
    pub enabled: bool,
    /// SerpAPI key; fallback is disabled without one
    pub api_key: Option<String>,
    /// SerpAPI endpoint
    pub base_url: String,
    /// Results requested (1..=10)
    pub num_results: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            base_url: "https://serpapi.com/search.json".to_string(),
            num_results: 6,
            timeout_secs: 20,
        }
    }
}

/// Index snapshot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Where the exported (or uploaded) archive lives
    pub archive_path: PathBuf,
    /// Size of each part when splitting an export
    pub part_size: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            archive_path: default_data_dir().join("index_snapshot.zip"),
            part_size: 100 * 1024 * 1024, // 100MB
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cocktail-rag")
}

impl RagConfig {
    /// Load configuration from an optional TOML file plus environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&raw)
    }

    /// Parse TOML text
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Overlay environment variables; `lookup` is injectable for tests
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("SUPABASE_URL") {
            self.storage.url = url.trim_end_matches('/').to_string();
        }
        if let Some(key) = non_empty("SUPABASE_SERVICE_ROLE_KEY") {
            self.storage.service_key = Some(key);
        }
        if let Some(bucket) = non_empty("SUPABASE_BUCKET") {
            self.storage.bucket = bucket;
        }
        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = non_empty("OPENAI_BASE_URL") {
            self.llm.base_url = url.clone();
            self.embeddings.base_url = url;
        }
        if let Some(key) = non_empty("SERPAPI_API_KEY") {
            self.web_search.api_key = Some(key);
        }
        if let Some(port) = non_empty("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(dir) = non_empty("COCKTAIL_RAG_INDEX_DIR") {
            self.vector_db.storage_path = PathBuf::from(dir);
        }
        if let Some(path) = non_empty("COCKTAIL_RAG_STATE_PATH") {
            self.ingestion.state_path = PathBuf::from(path);
        }
        if matches!(non_empty("SKIP_INGEST").as_deref(), Some("1") | Some("true")) {
            self.ingestion.run_on_startup = false;
        }
    }

    /// Reject configurations that cannot work
    pub fn validate(&self) -> Result<()> {
        let chunking = &self.chunking;
        if chunking.max_tokens == 0 || chunking.table_rows_per_chunk == 0 {
            return Err(Error::Config(
                "chunking.max_tokens and chunking.table_rows_per_chunk must be positive".to_string(),
            ));
        }
        if chunking.min_tokens > chunking.hard_max_tokens {
            return Err(Error::Config(format!(
                "chunking.min_tokens ({}) exceeds chunking.hard_max_tokens ({})",
                chunking.min_tokens, chunking.hard_max_tokens
            )));
        }
        if self.vector_db.upsert_batch_size == 0 {
            return Err(Error::Config("vector_db.upsert_batch_size must be positive".to_string()));
        }
        if self.storage.page_size == 0 {
            return Err(Error::Config("storage.page_size must be positive".to_string()));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::Config("embeddings.dimensions must be positive".to_string()));
        }
        for (name, value) in [
            ("llm.temperature", self.llm.temperature),
            ("llm.tagging_temperature", self.llm.tagging_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(Error::Config(format!("{} must be within 0.0..=2.0, got {}", name, value)));
            }
        }
        if self.storage.backend == StorageBackend::Supabase && self.storage.url.is_empty() {
            return Err(Error::Config(
                "storage.url (or SUPABASE_URL) is required for the supabase backend".to_string(),
            ));
        }
        if self.answer.top_k == 0 || self.answer.max_citations == 0 {
            return Err(Error::Config(
                "answer.top_k and answer.max_citations must be positive".to_string(),
            ));
        }
        if !(1..=10).contains(&self.web_search.num_results) {
            return Err(Error::Config("web_search.num_results must be within 1..=10".to_string()));
        }
        Ok(())
    }

    /// API key for embeddings, falling back to the LLM key
    pub fn embedding_api_key(&self) -> Option<&str> {
        self.embeddings
            .api_key
            .as_deref()
            .or(self.llm.api_key.as_deref())
    }
}
