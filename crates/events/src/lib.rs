//! Domain event publishing.
//!
//! Events are handed to a [`QueuedPublisher`], which places them on a bounded
//! queue and returns immediately. A single worker task drains the queue into a
//! [`Broker`]. Delivery is best effort and at least once: a broker failure is
//! logged and the event is dropped, and consumers must tolerate duplicates.

pub mod broker;
pub mod error;
pub mod event;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod publisher;

pub use broker::{Broker, InMemoryBroker, PublishedMessage};
pub use error::{PublishError, Result};
pub use event::{Event, InteractionKind, ProductEventData, ProductEventKind, topics};
#[cfg(feature = "kafka")]
pub use kafka::KafkaBroker;
pub use publisher::{EventPublisher, QueuedPublisher};
