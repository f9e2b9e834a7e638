//! Document ingestion pipeline
//!
//! Handles:
//! - Text extraction (PDF, CSV, EPUB)
//! - Cleaning and chunking
//! - Optional semantic tagging
//! - The persisted ingestion state and the coordinator that drives a run

pub mod chunker;
pub mod cleaner;
pub mod coordinator;
pub mod extractor;
pub mod state;
pub mod tagging;

pub use chunker::{estimate_tokens, TextChunker};
pub use cleaner::clean_text;
pub use coordinator::IngestCoordinator;
pub use extractor::{ExtractedText, TableText, TextExtractor};
pub use state::IngestionState;
pub use tagging::{normalize, ChunkTagger};
