//! Quiz and doubt turns

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use std::time::Instant;

use loominary_core::{TurnRequest, TurnResult};

use crate::metrics::record_llm_latency;
use crate::state::AppState;
use crate::ServerError;

pub const QUIZ_FAILED: &str = "Failed to process quiz response";

/// POST /api/quiz
pub async fn quiz(
    State(state): State<AppState>,
    payload: Result<Json<TurnRequest>, JsonRejection>,
) -> Result<Json<TurnResult>, ServerError> {
    // Any unreadable body is reported like a failed turn
    let Json(request) = payload.map_err(|rejection| {
        tracing::warn!(error = %rejection.body_text(), "Unreadable quiz request");
        ServerError::Llm(QUIZ_FAILED.to_string())
    })?;

    let service = state.turns();
    let started = Instant::now();
    let outcome = service.evaluate(&request).await;
    record_llm_latency("turn", service.is_mock(), started.elapsed());

    match outcome {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            tracing::error!(error = %e, mode = %request.mode, "Quiz turn failed");
            Err(ServerError::Llm(QUIZ_FAILED.to_string()))
        },
    }
}
