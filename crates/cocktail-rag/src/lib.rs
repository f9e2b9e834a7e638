//! cocktail-rag: retrieval-augmented answers over a cocktail and beverage research library
//!
//! Documents (PDF, CSV, EPUB) are pulled from Supabase Storage, cleaned,
//! chunked, optionally tagged by the LLM and embedded into a local SQLite
//! vector index. Questions are answered from the closest chunks with a
//! source list appended, falling back to web search when the library has
//! nothing useful.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod snapshot;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use generation::RagAnswerer;
pub use ingestion::IngestCoordinator;
pub use retrieval::VectorIndex;
pub use types::{
    response::{Answer, AskRequest, AskResponse, Citation, IngestReport},
    conversation::ConversationTurn,
};
