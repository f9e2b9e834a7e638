//! Error types for the cocktail RAG system

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// RAG system errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Document type the extractor cannot handle
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    /// Corrupt or unreadable document
    #[error("Failed to extract text from '{filename}': {message}")]
    ExtractionFailed { filename: String, message: String },

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Vector index query error
    #[error("Retrieval failed: {0}")]
    RetrievalFailed(String),

    /// Vector index write or open error
    #[error("Vector database error: {0}")]
    VectorDb(String),

    /// Chat completion error
    #[error("Completion failed: {0}")]
    CompletionFailed(String),

    /// Remote object store error
    #[error("Object store error: {0}")]
    ObjectStore(String),

    /// Web search error
    #[error("Web search failed: {0}")]
    WebSearch(String),

    /// Ingestion state persistence error
    #[error("Storage I/O error: {0}")]
    StorageIo(String),

    /// Index snapshot export/restore error
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Archive error
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an extraction error
    pub fn extraction(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExtractionFailed {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a vector db error
    pub fn vector_db(message: impl Into<String>) -> Self {
        Self::VectorDb(message.into())
    }

    /// Create a completion error
    pub fn completion(message: impl Into<String>) -> Self {
        Self::CompletionFailed(message.into())
    }

    /// Create an object store error
    pub fn object_store(message: impl Into<String>) -> Self {
        Self::ObjectStore(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Short machine-readable tag, also used in ingestion reports
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config_error",
            Error::UnsupportedFormat(_) => "unsupported_type",
            Error::ExtractionFailed { .. } => "extraction_error",
            Error::Embedding(_) => "embedding_error",
            Error::RetrievalFailed(_) => "retrieval_error",
            Error::VectorDb(_) => "vector_db_error",
            Error::CompletionFailed(_) => "completion_error",
            Error::ObjectStore(_) => "object_store_error",
            Error::WebSearch(_) => "web_search_error",
            Error::StorageIo(_) => "storage_io_error",
            Error::Snapshot(_) => "snapshot_error",
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
            Error::Http(_) => "http_error",
            Error::Sqlite(_) => "sqlite_error",
            Error::Zip(_) => "archive_error",
            Error::Internal(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::Config(_)
            | Error::UnsupportedFormat(_)
            | Error::ExtractionFailed { .. }
            | Error::Json(_)
            | Error::Snapshot(_)
            | Error::Zip(_) => StatusCode::BAD_REQUEST,
            Error::CompletionFailed(_) | Error::Embedding(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::ObjectStore(_) | Error::WebSearch(_) | Error::Http(_) => StatusCode::BAD_GATEWAY,
            Error::RetrievalFailed(_)
            | Error::VectorDb(_)
            | Error::StorageIo(_)
            | Error::Io(_)
            | Error::Sqlite(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(json!({
            "error": {
                "type": self.kind(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_shape() {
        let response = Error::completion("upstream timed out").into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_extraction_message() {
        let err = Error::extraction("menu.pdf", "no extractable text");
        assert_eq!(err.kind(), "extraction_error");
        assert!(err.to_string().contains("menu.pdf"));
    }
}
