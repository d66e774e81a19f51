use thiserror::Error;

/// Errors that can occur when publishing an event.
///
/// Callers that publish as a side effect log these and carry on.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The event could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The publisher queue is full; the event was not accepted.
    #[error("Publisher queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// The publisher has been shut down.
    #[error("Publisher is closed")]
    Closed,

    /// The broker rejected or failed to acknowledge the message.
    #[error("Broker error on topic {topic}: {reason}")]
    Broker { topic: String, reason: String },
}

/// Result type for publishing operations.
pub type Result<T> = std::result::Result<T, PublishError>;
