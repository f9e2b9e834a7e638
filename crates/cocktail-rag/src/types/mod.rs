//! Core types for the RAG system

pub mod conversation;
pub mod document;
pub mod response;

pub use conversation::{ChatMessage, ConversationTurn, Role};
pub use document::{
    Chunk, FileType, IndexedRecord, Metadata, RemoteDocument, RetrievedChunk, META_CHUNK,
    META_CONTENT_HASH, META_LEGACY_CHUNK, META_PATH, META_SOURCE, META_URL,
};
pub use response::{
    Answer, AskRequest, AskResponse, Citation, ContextOrigin, HealthResponse, IngestFailure,
    IngestReport, PendingResponse, RetagReport, SourceOrigin,
};
