//! Course chat message persistence

use crate::{PersistenceError, ScyllaClient};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loominary_core::{ChatMessage, MessageAuthor};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Message store trait
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append(&self, message: &ChatMessage) -> Result<(), PersistenceError>;

    /// The newest `limit` messages of a course, oldest first
    async fn recent(
        &self,
        course_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, PersistenceError>;
}

/// ScyllaDB implementation of message store
#[derive(Clone)]
pub struct ScyllaMessageStore {
    client: ScyllaClient,
}

impl ScyllaMessageStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MessageStore for ScyllaMessageStore {
    async fn append(&self, message: &ChatMessage) -> Result<(), PersistenceError> {
        let query = format!(
            "INSERT INTO {}.course_messages (
                course_id, created_at, message_id, user_id, user_name, user_email, content
            ) VALUES (?, ?, ?, ?, ?, ?, ?)",
            self.client.keyspace()
        );

        self.client
            .session()
            .query_unpaged(
                query,
                (
                    &message.course_id,
                    message.created_at.timestamp_millis(),
                    &message.id,
                    &message.user_id,
                    &message.user.name,
                    &message.user.email,
                    &message.content,
                ),
            )
            .await?;

        tracing::debug!(
            course_id = %message.course_id,
            message_id = %message.id,
            "Chat message stored"
        );

        Ok(())
    }

    async fn recent(
        &self,
        course_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, PersistenceError> {
        let query = format!(
            "SELECT course_id, created_at, message_id, user_id, user_name, user_email, content
             FROM {}.course_messages WHERE course_id = ? LIMIT ?",
            self.client.keyspace()
        );

        let limit = i32::try_from(limit).unwrap_or(i32::MAX);
        let result = self
            .client
            .session()
            .query_unpaged(query, (course_id, limit))
            .await?;

        let mut messages = Vec::new();
        if let Some(rows) = result.rows {
            for row in rows {
                messages.push(row_to_message(row)?);
            }
        }

        // Clustering order is newest first
        messages.reverse();
        Ok(messages)
    }
}

fn row_to_message(row: scylla::frame::response::result::Row) -> Result<ChatMessage, PersistenceError> {
    let (course_id, created_at, id, user_id, user_name, user_email, content): (
        String,
        i64,
        String,
        String,
        Option<String>,
        Option<String>,
        String,
    ) = row
        .into_typed()
        .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;

    Ok(ChatMessage {
        id,
        content,
        course_id,
        user_id,
        user: MessageAuthor {
            name: user_name,
            email: user_email,
        },
        created_at: DateTime::from_timestamp_millis(created_at).unwrap_or_else(Utc::now),
    })
}

/// Process-local message store
#[derive(Default)]
pub struct InMemoryMessageStore {
    courses: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn append(&self, message: &ChatMessage) -> Result<(), PersistenceError> {
        let mut courses = self.courses.write();
        let messages = courses.entry(message.course_id.clone()).or_default();
        // Keep creation order even if clocks disagree
        let pos = messages.partition_point(|m| m.created_at <= message.created_at);
        messages.insert(pos, message.clone());
        Ok(())
    }

    async fn recent(
        &self,
        course_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, PersistenceError> {
        let courses = self.courses.read();
        let messages = courses.get(course_id).map(Vec::as_slice).unwrap_or(&[]);
        let start = messages.len().saturating_sub(limit);
        Ok(messages[start..].to_vec())
    }
}
