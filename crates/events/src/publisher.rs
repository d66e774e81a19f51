//! Non-blocking publisher backed by a bounded queue and one worker task.

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{Broker, Event, PublishError, Result};

/// Accepts events for delivery without waiting for the broker.
///
/// `publish` returns as soon as the event is queued. An `Err` means the event
/// was not accepted; it never reflects a broker outcome.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, topic: &str, event: &Event) -> Result<()>;
}

impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    fn publish(&self, topic: &str, event: &Event) -> Result<()> {
        (**self).publish(topic, event)
    }
}

#[derive(Debug)]
struct QueuedMessage {
    topic: String,
    key: String,
    payload: Vec<u8>,
}

struct Inner {
    sender: RwLock<Option<mpsc::Sender<QueuedMessage>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    capacity: usize,
}

/// Publisher that queues events for a dedicated worker.
///
/// The queue is bounded, so a burst of orders cannot grow memory or spawn
/// tasks without limit: once full, `publish` fails fast with `QueueFull`.
/// The worker sends one message at a time, logs broker failures and moves on.
#[derive(Clone)]
pub struct QueuedPublisher {
    inner: Arc<Inner>,
}

impl QueuedPublisher {
    /// Starts the worker on the current Tokio runtime.
    pub fn spawn(broker: Arc<dyn Broker>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let worker = tokio::spawn(run_worker(broker, receiver));

        Self {
            inner: Arc::new(Inner {
                sender: RwLock::new(Some(sender)),
                worker: Mutex::new(Some(worker)),
                capacity,
            }),
        }
    }

    /// Maximum number of events waiting for the worker.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Stops accepting events and waits for the worker to drain the queue.
    ///
    /// Safe to call more than once and from any clone.
    pub async fn shutdown(&self) {
        self.inner
            .sender
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let worker = self.inner.worker.lock().await.take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "event publisher worker panicked");
            }
            tracing::info!("event publisher stopped");
        }
    }
}

impl EventPublisher for QueuedPublisher {
    fn publish(&self, topic: &str, event: &Event) -> Result<()> {
        let message = QueuedMessage {
            topic: topic.to_string(),
            key: Uuid::new_v4().to_string(),
            payload: event.to_bytes()?,
        };

        let guard = self
            .inner
            .sender
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let sender = guard.as_ref().ok_or(PublishError::Closed)?;

        sender.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                metrics::counter!("events_dropped_total", "reason" => "queue_full").increment(1);
                PublishError::QueueFull {
                    capacity: self.inner.capacity,
                }
            }
            mpsc::error::TrySendError::Closed(_) => PublishError::Closed,
        })
    }
}

async fn run_worker(broker: Arc<dyn Broker>, mut receiver: mpsc::Receiver<QueuedMessage>) {
    tracing::debug!("event publisher worker started");
    while let Some(message) = receiver.recv().await {
        match broker
            .send(&message.topic, &message.key, &message.payload)
            .await
        {
            Ok(()) => {
                metrics::counter!("events_published_total", "topic" => message.topic.clone())
                    .increment(1);
            }
            Err(e) => {
                metrics::counter!("events_dropped_total", "reason" => "broker").increment(1);
                tracing::warn!(
                    topic = %message.topic,
                    key = %message.key,
                    error = %e,
                    "failed to publish event"
                );
            }
        }
    }
    tracing::debug!("event publisher worker drained");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use common::{AccountId, ProductId};

    use super::*;
    use crate::{InMemoryBroker, topics};

    fn purchase(product: &str) -> Event {
        Event::purchase(AccountId::new(42), &ProductId::new(product))
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let broker = InMemoryBroker::new();
        let publisher = QueuedPublisher::spawn(Arc::new(broker.clone()), 16);

        for i in 0..5 {
            publisher
                .publish(topics::INTERACTION_EVENTS, &purchase(&format!("p{i}")))
                .unwrap();
        }
        publisher.shutdown().await;

        let messages = broker.messages().await;
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0].payload["data"]["product_id"], "p0");
        assert_eq!(messages[4].payload["data"]["product_id"], "p4");
    }

    #[tokio::test]
    async fn test_messages_get_distinct_keys() {
        let broker = InMemoryBroker::new();
        let publisher = QueuedPublisher::spawn(Arc::new(broker.clone()), 4);

        let event = purchase("same");
        publisher.publish(topics::INTERACTION_EVENTS, &event).unwrap();
        publisher.publish(topics::INTERACTION_EVENTS, &event).unwrap();
        publisher.shutdown().await;

        let messages = broker.messages().await;
        assert_eq!(messages.len(), 2);
        assert_ne!(messages[0].key, messages[1].key);
    }

    #[tokio::test]
    async fn test_full_queue_fails_fast() {
        let broker = InMemoryBroker::new();
        broker.set_delay(Some(Duration::from_secs(3600))).await;
        let publisher = QueuedPublisher::spawn(Arc::new(broker), 1);

        // One message may be in flight and one queued; the third cannot fit.
        let results: Vec<_> = (0..3)
            .map(|i| publisher.publish(topics::INTERACTION_EVENTS, &purchase(&format!("p{i}"))))
            .collect();

        assert!(results[0].is_ok());
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(PublishError::QueueFull { capacity: 1 })))
        );
    }

    #[tokio::test]
    async fn test_broker_failure_is_not_reported_to_caller() {
        let broker = InMemoryBroker::new();
        broker.set_fail_on_send(true).await;
        let publisher = QueuedPublisher::spawn(Arc::new(broker.clone()), 4);

        assert!(publisher.publish(topics::INTERACTION_EVENTS, &purchase("p")).is_ok());
        publisher.shutdown().await;

        assert_eq!(broker.message_count().await, 0);
    }

    #[tokio::test]
    async fn test_publish_after_shutdown_is_closed() {
        let publisher = QueuedPublisher::spawn(Arc::new(InMemoryBroker::new()), 4);
        publisher.shutdown().await;
        publisher.shutdown().await;

        let result = publisher.publish(topics::INTERACTION_EVENTS, &purchase("p"));
        assert!(matches!(result, Err(PublishError::Closed)));
    }
}
