//! Ingestion endpoints

use axum::{extract::State, Json};

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{IngestReport, PendingResponse, RetagReport};

/// GET /run-once - Ingest every new document in the library
pub async fn run_once(State(state): State<AppState>) -> Result<Json<IngestReport>> {
    let report = state.coordinator().run_once().await?;
    Ok(Json(report))
}

/// GET /ingestion/pending - Documents in storage that are not ingested yet
pub async fn pending(State(state): State<AppState>) -> Result<Json<PendingResponse>> {
    let pending: Vec<String> = state
        .coordinator()
        .pending_documents()
        .await?
        .into_iter()
        .map(|d| d.path)
        .collect();

    Ok(Json(PendingResponse {
        count: pending.len(),
        pending,
    }))
}

/// POST /retag - Re-run semantic tagging over the whole index
pub async fn retag(State(state): State<AppState>) -> Result<Json<RetagReport>> {
    let report = state.coordinator().retag_all().await?;
    Ok(Json(report))
}
