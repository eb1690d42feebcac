//! Course chat endpoints

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use loominary_core::ChatMessage;

use crate::auth::AuthUser;
use crate::extract::ApiJson;
use crate::state::AppState;
use crate::ServerError;

const INTERNAL: &str = "Internal Server Error";

#[derive(Debug, Deserialize)]
pub struct NewMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// GET /api/messages/:course_id
pub async fn list_messages(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, ServerError> {
    let limit = state.get_config().chat.history_limit;

    let messages = state.messages.recent(&course_id, limit).await.map_err(|e| {
        tracing::error!(error = %e, %course_id, "Failed to fetch messages");
        ServerError::Internal(INTERNAL.to_string())
    })?;

    Ok(Json(messages))
}

/// POST /api/messages/:course_id
pub async fn create_message(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    ApiJson(request): ApiJson<NewMessage>,
) -> Result<Json<ChatMessage>, ServerError> {
    let content = request
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ServerError::InvalidRequest("Message content required".to_string()))?;

    let message = ChatMessage::new(course_id, &user, content);
    state.messages.append(&message).await.map_err(|e| {
        tracing::error!(error = %e, course_id = %message.course_id, "Failed to store message");
        ServerError::Internal(INTERNAL.to_string())
    })?;

    tracing::debug!(course_id = %message.course_id, user_id = %user.id, "Message posted");
    Ok(Json(message))
}
