//! Account persistence

use crate::{PersistenceError, ScyllaClient};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loominary_core::User;
use parking_lot::RwLock;
use scylla::frame::response::result::CqlValue;
use std::collections::HashMap;
use uuid::Uuid;

/// Stored account including the credential hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    /// PHC string (argon2)
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(name: Option<String>, email: &str, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            email: normalize_email(email),
            password_hash,
            created_at: Utc::now(),
        }
    }

    /// Public view, without the hash
    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Emails are matched case-insensitively
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// User store trait
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`PersistenceError::AlreadyExists`] when the email is taken
    async fn create(&self, user: &UserRecord) -> Result<(), PersistenceError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, PersistenceError>;
}

/// ScyllaDB implementation of user store
#[derive(Clone)]
pub struct ScyllaUserStore {
    client: ScyllaClient,
}

impl ScyllaUserStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UserStore for ScyllaUserStore {
    async fn create(&self, user: &UserRecord) -> Result<(), PersistenceError> {
        let query = format!(
            "INSERT INTO {}.users (email, user_id, name, password_hash, created_at)
             VALUES (?, ?, ?, ?, ?) IF NOT EXISTS",
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(
                query,
                (
                    &user.email,
                    &user.id,
                    &user.name,
                    &user.password_hash,
                    user.created_at.timestamp_millis(),
                ),
            )
            .await?;

        // Lightweight transaction: first column is [applied]
        let applied = result
            .rows
            .and_then(|rows| rows.into_iter().next())
            .and_then(|row| row.columns.into_iter().next().flatten())
            .and_then(|value| match value {
                CqlValue::Boolean(applied) => Some(applied),
                _ => None,
            })
            .unwrap_or(false);

        if !applied {
            return Err(PersistenceError::AlreadyExists(user.email.clone()));
        }

        tracing::info!(user_id = %user.id, "User registered");
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, PersistenceError> {
        let query = format!(
            "SELECT email, user_id, name, password_hash, created_at FROM {}.users WHERE email = ?",
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(query, (normalize_email(email),))
            .await?;

        if let Some(rows) = result.rows {
            if let Some(row) = rows.into_iter().next() {
                let (email, id, name, password_hash, created_at): (
                    String,
                    String,
                    Option<String>,
                    String,
                    i64,
                ) = row
                    .into_typed()
                    .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;

                return Ok(Some(UserRecord {
                    id,
                    name,
                    email,
                    password_hash,
                    created_at: DateTime::from_timestamp_millis(created_at)
                        .unwrap_or_else(Utc::now),
                }));
            }
        }

        Ok(None)
    }
}

/// Process-local user store
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, user: &UserRecord) -> Result<(), PersistenceError> {
        let mut users = self.users.write();
        let key = normalize_email(&user.email);
        if users.contains_key(&key) {
            return Err(PersistenceError::AlreadyExists(key));
        }
        users.insert(key, user.clone());
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, PersistenceError> {
        Ok(self.users.read().get(&normalize_email(email)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = InMemoryUserStore::new();
        let user = UserRecord::new(Some("Ada".to_string()), "Ada@Example.com ", "hash".to_string());
        assert_eq!(user.email, "ada@example.com");

        store.create(&user).await.unwrap();
        let again = UserRecord::new(None, "ada@example.com", "other".to_string());
        assert!(matches!(
            store.create(&again).await,
            Err(PersistenceError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_find_is_case_insensitive() {
        let store = InMemoryUserStore::new();
        let user = UserRecord::new(None, "grace@example.com", "hash".to_string());
        store.create(&user).await.unwrap();

        let found = store.find_by_email("GRACE@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.to_user().email, "grace@example.com");
        assert!(store.find_by_email("nobody@example.com").await.unwrap().is_none());
    }
}
