//! Loominary Server
//!
//! HTTP API for note analysis, quiz turns, course chat and accounts.

pub mod analyze;
pub mod auth;
pub mod extract;
pub mod http;
pub mod messages;
pub mod metrics;
pub mod quiz;
pub mod state;

pub use auth::{issue_token, AuthUser, Claims};
pub use extract::ApiJson;
pub use http::create_router;
pub use metrics::{init_metrics, record_error, record_llm_latency, record_request};
pub use state::AppState;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use loominary_llm::LlmError;
use loominary_persistence::PersistenceError;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    /// Message is returned to the caller verbatim
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Llm(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("{0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServerError::Conflict(_) => StatusCode::CONFLICT,
            ServerError::Llm(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ServerError::InvalidRequest(_) => "invalid_request",
            ServerError::Unauthorized => "unauthorized",
            ServerError::Conflict(_) => "conflict",
            ServerError::Llm(_) => "llm",
            ServerError::Persistence(_) => "persistence",
            ServerError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        record_error(self.kind());
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<LlmError> for ServerError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::InvalidInput(msg) => ServerError::InvalidRequest(msg),
            other => ServerError::Llm(other.to_string()),
        }
    }
}

impl From<PersistenceError> for ServerError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::AlreadyExists(msg) => ServerError::Conflict(msg),
            other => ServerError::Persistence(other.to_string()),
        }
    }
}

impl From<ServerError> for StatusCode {
    fn from(err: ServerError) -> Self {
        err.status()
    }
}
