//! ScyllaDB schema creation
//!
//! Timestamps are stored as BIGINT milliseconds since the epoch.

use crate::error::PersistenceError;
use scylla::Session;

/// Create the keyspace if it doesn't exist
pub async fn create_keyspace(
    session: &Session,
    keyspace: &str,
    replication_factor: u32,
) -> Result<(), PersistenceError> {
    let query = format!(
        "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
        keyspace, replication_factor
    );

    session
        .query_unpaged(query, &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("Failed to create keyspace: {}", e)))?;

    Ok(())
}

/// Create all required tables
pub async fn create_tables(session: &Session, keyspace: &str) -> Result<(), PersistenceError> {
    // Course chat, newest first within a course partition
    let messages_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.course_messages (
            course_id TEXT,
            created_at BIGINT,
            message_id TEXT,
            user_id TEXT,
            user_name TEXT,
            user_email TEXT,
            content TEXT,
            PRIMARY KEY ((course_id), created_at, message_id)
        ) WITH CLUSTERING ORDER BY (created_at DESC, message_id DESC)
    "#,
        keyspace
    );

    session.query_unpaged(messages_table, &[]).await.map_err(|e| {
        PersistenceError::SchemaError(format!("Failed to create course_messages table: {}", e))
    })?;

    // Accounts, keyed by normalized email
    let users_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.users (
            email TEXT,
            user_id TEXT,
            name TEXT,
            password_hash TEXT,
            created_at BIGINT,
            PRIMARY KEY (email)
        )
    "#,
        keyspace
    );

    session
        .query_unpaged(users_table, &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("Failed to create users table: {}", e)))?;

    Ok(())
}
