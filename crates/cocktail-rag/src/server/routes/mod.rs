//! API routes for the RAG server

pub mod ask;
pub mod ingest;
pub mod snapshot;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};

use crate::providers::VectorStoreProvider;
use crate::server::state::AppState;
use crate::types::HealthResponse;

/// Build all routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(info))
        .route("/health", get(health))
        // Question answering
        .route("/ask", post(ask::ask))
        // Ingestion
        .route("/run-once", get(ingest::run_once).post(ingest::run_once))
        .route("/ingestion/pending", get(ingest::pending))
        .route("/retag", post(ingest::retag))
        // Index snapshots - upload gets the larger body limit
        .route("/snapshot/export", post(snapshot::export))
        .route("/snapshot/download", get(snapshot::download))
        .route(
            "/snapshot/upload",
            post(snapshot::upload).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/snapshot/restore", post(snapshot::restore))
}

/// Service info endpoint
async fn info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "cocktail-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Retrieval-augmented answers over a cocktail and beverage research library",
        "endpoints": {
            "POST /ask": "Answer a question with cited sources",
            "GET /health": "Index status and record count",
            "GET /run-once": "Ingest new documents from storage",
            "GET /ingestion/pending": "Documents in storage not yet ingested",
            "POST /retag": "Re-run semantic tagging over the index",
            "POST /snapshot/export": "Zip the index directory",
            "GET /snapshot/download": "Download the index archive",
            "POST /snapshot/upload": "Upload an index archive (multipart)",
            "POST /snapshot/restore": "Replace the index with the uploaded archive"
        }
    }))
}

/// Health endpoint: reports the index size, or the error counting it
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    match state.index().count().await {
        Ok(count) => Json(HealthResponse::ok(count)),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            Json(HealthResponse::error(e.to_string()))
        }
    }
}
