//! Broker transport.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{PublishError, Result};

/// Transport that delivers serialized events to a topic.
///
/// Implementations wait for the broker's acknowledgment. Callers of the
/// publisher never do; only the publisher worker calls `send`.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<()>;
}

/// A message accepted by [`InMemoryBroker`].
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub key: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Default)]
struct InMemoryBrokerState {
    messages: VecDeque<PublishedMessage>,
    retention: Option<usize>,
    fail_on_send: bool,
    delay: Option<Duration>,
}

/// In-memory broker for development and testing.
///
/// Logs every accepted message and keeps it, or only the latest ones when
/// built [`with_retention`](Self::with_retention). Can be told to fail or to
/// stall on each send.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<RwLock<InMemoryBrokerState>>,
}

impl InMemoryBroker {
    /// Creates a new in-memory broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a broker that keeps at most `max` messages, dropping the oldest.
    pub fn with_retention(max: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(InMemoryBrokerState {
                retention: Some(max),
                ..Default::default()
            })),
        }
    }

    /// Configures the broker to reject every following send.
    pub async fn set_fail_on_send(&self, fail: bool) {
        self.state.write().await.fail_on_send = fail;
    }

    /// Configures a delay applied before each send completes.
    pub async fn set_delay(&self, delay: Option<Duration>) {
        self.state.write().await.delay = delay;
    }

    /// Returns all accepted messages in arrival order.
    pub async fn messages(&self) -> Vec<PublishedMessage> {
        self.state.read().await.messages.iter().cloned().collect()
    }

    /// Returns the accepted messages for one topic.
    pub async fn messages_for(&self, topic: &str) -> Vec<PublishedMessage> {
        self.state
            .read()
            .await
            .messages
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    /// Returns the number of accepted messages.
    pub async fn message_count(&self) -> usize {
        self.state.read().await.messages.len()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<()> {
        let delay = self.state.read().await.delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().await;
        if state.fail_on_send {
            return Err(PublishError::Broker {
                topic: topic.to_string(),
                reason: "broker unavailable".to_string(),
            });
        }

        let payload: serde_json::Value = serde_json::from_slice(payload)?;
        tracing::debug!(%topic, %key, %payload, "message accepted by in-memory broker");
        if let Some(max) = state.retention {
            if max == 0 {
                return Ok(());
            }
            while state.messages.len() >= max {
                state.messages.pop_front();
            }
        }
        state.messages.push_back(PublishedMessage {
            topic: topic.to_string(),
            key: key.to_string(),
            payload,
        });
        Ok(())
    }
}
