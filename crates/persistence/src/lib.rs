//! ScyllaDB persistence layer for the study assistant
//!
//! Provides persistent storage for:
//! - Course chat messages
//! - User accounts
//!
//! In-memory implementations of both stores back development setups and
//! tests where no cluster is available.

pub mod client;
pub mod error;
pub mod messages;
pub mod schema;
pub mod users;

pub use client::{ScyllaClient, ScyllaConfig};
pub use error::PersistenceError;
pub use messages::{InMemoryMessageStore, MessageStore, ScyllaMessageStore};
pub use users::{normalize_email, InMemoryUserStore, ScyllaUserStore, UserRecord, UserStore};

use std::sync::Arc;

/// Initialize the persistence layer with ScyllaDB
pub async fn init(config: ScyllaConfig) -> Result<PersistenceLayer, PersistenceError> {
    let client = ScyllaClient::connect(config).await?;
    client.ensure_schema().await?;

    Ok(PersistenceLayer {
        messages: Arc::new(ScyllaMessageStore::new(client.clone())),
        users: Arc::new(ScyllaUserStore::new(client)),
    })
}

/// Combined persistence layer with all stores
#[derive(Clone)]
pub struct PersistenceLayer {
    pub messages: Arc<dyn MessageStore>,
    pub users: Arc<dyn UserStore>,
}

impl PersistenceLayer {
    /// Stores that live only as long as the process
    pub fn in_memory() -> Self {
        Self {
            messages: Arc::new(InMemoryMessageStore::new()),
            users: Arc::new(InMemoryUserStore::new()),
        }
    }
}
