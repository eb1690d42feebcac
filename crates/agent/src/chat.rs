//! Course chat polling
//!
//! Fetches the course's messages immediately and then on a fixed interval.
//! Fetch failures are logged and the previous list is kept.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use loominary_core::ChatMessage;

use crate::AgentError;

/// Server side of the chat
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn fetch_messages(&self, course_id: &str) -> Result<Vec<ChatMessage>, AgentError>;

    async fn post_message(&self, course_id: &str, content: &str) -> Result<ChatMessage, AgentError>;
}

/// Polls one course's chat
pub struct ChatPoller {
    backend: Arc<dyn ChatBackend>,
    course_id: String,
    poll_interval: Duration,
    messages_tx: watch::Sender<Vec<ChatMessage>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ChatPoller {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        course_id: impl Into<String>,
        poll_interval: Duration,
    ) -> Arc<Self> {
        let (messages_tx, _) = watch::channel(Vec::new());
        let (shutdown_tx, _) = broadcast::channel(1);
        Arc::new(Self {
            backend,
            course_id: course_id.into(),
            poll_interval,
            messages_tx,
            shutdown_tx,
        })
    }

    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    /// Current list
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.messages_tx.subscribe()
    }

    /// Fetch once and publish the result
    pub async fn refresh(&self) -> Result<(), AgentError> {
        let messages = self.backend.fetch_messages(&self.course_id).await?;
        self.messages_tx.send_if_modified(|current| {
            if *current == messages {
                false
            } else {
                *current = messages;
                true
            }
        });
        Ok(())
    }

    /// Start polling until [`stop`](Self::stop) is called
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let poller = self.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = interval(poller.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::debug!(course_id = %poller.course_id, "Chat polling stopped");
                        break;
                    }
                    // First tick completes immediately
                    _ = ticker.tick() => {
                        if let Err(e) = poller.refresh().await {
                            tracing::warn!(course_id = %poller.course_id, error = %e, "Failed to fetch messages");
                        }
                    }
                }
            }
        })
    }

    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Post a message and append the server's copy locally
    pub async fn send(&self, content: &str) -> Result<ChatMessage, AgentError> {
        if content.trim().is_empty() {
            return Err(AgentError::InvalidInput(
                "Message content required".to_string(),
            ));
        }

        let message = self.backend.post_message(&self.course_id, content).await?;
        self.messages_tx
            .send_modify(|messages| messages.push(message.clone()));
        Ok(message)
    }
}
