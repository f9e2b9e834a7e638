//! Question answering endpoint

use axum::{extract::State, Json};
use std::time::Instant;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{AskRequest, AskResponse};

/// POST /ask - Answer a question from the library
pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>> {
    let start = Instant::now();
    tracing::info!(
        question_chars = request.question.chars().count(),
        history_turns = request.history.len(),
        "Received question"
    );
    tracing::debug!(question = %request.question, "Question text");

    let answer = state
        .answerer()
        .answer(&request.question, &request.history)
        .await?;

    tracing::info!(
        sources = answer.citations.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Answered question"
    );
    Ok(Json(answer.into()))
}
