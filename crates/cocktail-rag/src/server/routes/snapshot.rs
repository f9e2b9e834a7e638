//! Index snapshot endpoints: export, download, upload, restore

use axum::{
    extract::{Multipart, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use std::path::Path;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::snapshot::SnapshotInfo;

async fn blocking<T, F>(op: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| Error::internal(format!("snapshot task failed: {}", e)))?
}

/// POST /snapshot/export - Zip the index directory
pub async fn export(State(state): State<AppState>) -> Result<Json<SnapshotInfo>> {
    let _guard = state.snapshot_lock().lock().await;

    let index_dir = state
        .index()
        .storage_path()
        .map(Path::to_path_buf)
        .ok_or_else(|| Error::Snapshot("index is not persisted on disk".to_string()))?;
    let snapshot = state.snapshot().clone();

    let info = blocking(move || snapshot.export(&index_dir)).await?;
    Ok(Json(info))
}

fn require_archive(state: &AppState) -> Result<()> {
    if state.snapshot().has_archive() {
        Ok(())
    } else {
        Err(Error::Snapshot(
            "no snapshot archive; export or upload one first".to_string(),
        ))
    }
}

/// GET /snapshot/download - The current archive
pub async fn download(State(state): State<AppState>) -> Result<impl IntoResponse> {
    require_archive(&state)?;
    let path = state.snapshot().archive_path().to_path_buf();
    let data = tokio::fs::read(&path).await.map_err(|e| {
        Error::Snapshot(format!("no snapshot archive at {}: {}", path.display(), e))
    })?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "index_snapshot.zip".to_string());

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        data,
    ))
}

/// POST /snapshot/upload - Replace the staged archive (multipart, first file field)
pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<SnapshotInfo>> {
    let _guard = state.snapshot_lock().lock().await;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Snapshot(format!("Failed to read multipart field: {}", e)))?
    {
        if field.file_name().is_none() {
            continue;
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| Error::Snapshot(format!("Failed to read upload: {}", e)))?;
        tracing::info!("Received snapshot upload ({} bytes)", data.len());

        let snapshot = state.snapshot().clone();
        let info = blocking(move || snapshot.stage_upload(&data)).await?;
        return Ok(Json(info));
    }

    Err(Error::Snapshot("upload contained no file".to_string()))
}

/// POST /snapshot/restore - Replace the index with the staged archive
pub async fn restore(State(state): State<AppState>) -> Result<Json<Value>> {
    let _guard = state.snapshot_lock().lock().await;
    require_archive(&state)?;

    let index = state.index();
    let snapshot = state.snapshot().clone();
    let count = blocking(move || {
        index.reopen_with(|dir| snapshot.restore_into(dir).map(|_| ()))
    })
    .await?;

    Ok(Json(json!({
        "status": "restored",
        "count": count,
    })))
}
