//! Course chat and user types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Author display fields embedded in each message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAuthor {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// A message in a course chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub content: String,
    pub course_id: String,
    pub user_id: String,
    pub user: MessageAuthor,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Build a message with a fresh id and the current timestamp
    pub fn new(
        course_id: impl Into<String>,
        author: &User,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            course_id: course_id.into(),
            user_id: author.id.clone(),
            user: author.display(),
            created_at: Utc::now(),
        }
    }
}

/// An account as seen by the rest of the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
}

impl User {
    pub fn display(&self) -> MessageAuthor {
        MessageAuthor {
            name: self.name.clone(),
            email: Some(self.email.clone()),
        }
    }
}
