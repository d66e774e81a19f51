//! Kafka transport, enabled with the `kafka` feature.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;

use crate::{Broker, PublishError, Result};

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Broker backed by an rdkafka `FutureProducer`.
pub struct KafkaBroker {
    producer: FutureProducer,
}

impl KafkaBroker {
    /// Connects a producer to the given bootstrap servers.
    pub fn new(brokers: &str) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| PublishError::Broker {
                topic: String::new(),
                reason: format!("failed to create Kafka producer: {e}"),
            })?;

        tracing::info!(%brokers, "Kafka producer created");
        Ok(Self { producer })
    }
}

#[async_trait]
impl Broker for KafkaBroker {
    async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<()> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        self.producer
            .send(record, Timeout::After(SEND_TIMEOUT))
            .await
            .map_err(|(e, _)| PublishError::Broker {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!(%topic, %key, "published to Kafka");
        Ok(())
    }
}
