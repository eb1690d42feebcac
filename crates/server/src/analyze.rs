//! Note upload and analysis
//!
//! POST /api/analyze takes multipart `files` parts. PDFs are parsed on a
//! blocking thread; anything else is read as UTF-8.

use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use std::time::Instant;

use loominary_core::CourseAnalysis;
use loominary_llm::SourceDocument;

use crate::metrics::record_llm_latency;
use crate::state::AppState;
use crate::ServerError;

const FILES_FIELD: &str = "files";
const PDF_MIME: &str = "application/pdf";

/// POST /api/analyze
pub async fn analyze(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<CourseAnalysis>, ServerError> {
    let mut multipart = multipart?;
    let mut documents = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::InvalidRequest(format!("Invalid upload: {}", e)))?
    {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("file-{}", documents.len() + 1));
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::InvalidRequest(format!("Invalid upload: {}", e)))?;

        let text = extract_text(&file_name, content_type.as_deref(), bytes).await?;
        tracing::debug!(file = %file_name, chars = text.len(), "Extracted text");
        documents.push(SourceDocument::new(file_name, text));
    }

    let service = state.analysis();
    let started = Instant::now();
    let outcome = service.analyze(&documents).await;
    record_llm_latency("analysis", service.is_mock(), started.elapsed());

    let analysis = outcome?;
    tracing::info!(
        files = documents.len(),
        documents = analysis.documents.len(),
        mock = service.is_mock(),
        "Notes analyzed"
    );
    Ok(Json(analysis))
}

fn is_pdf(file_name: &str, content_type: Option<&str>) -> bool {
    content_type == Some(PDF_MIME) || file_name.to_ascii_lowercase().ends_with(".pdf")
}

async fn extract_text(
    file_name: &str,
    content_type: Option<&str>,
    bytes: Bytes,
) -> Result<String, ServerError> {
    if !is_pdf(file_name, content_type) {
        return Ok(String::from_utf8_lossy(&bytes).into_owned());
    }

    let parsed = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| ServerError::Internal(format!("Failed to read PDF {}: {}", file_name, e)))?;

    parsed.map_err(|e| ServerError::Internal(format!("Failed to read PDF {}: {}", file_name, e)))
}
