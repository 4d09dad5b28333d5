//! Queue Gateway: the broker-facing side of the crawl
//!
//! The queue is the crawl frontier. Roles only see the [`Publisher`] and
//! [`DeliverySource`] traits; [`AmqpGateway`] implements them against an
//! AMQP broker and [`MemoryQueue`] implements them in-process.

mod amqp;
mod memory;

pub use amqp::{AmqpDelivery, AmqpGateway, AmqpSubscription};
pub use memory::{MemoryDelivery, MemoryQueue, MemorySubscription, QueueEvent};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors raised by the queue layer
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Failed to connect to {uri}: {source}")]
    Connect { uri: String, source: lapin::Error },

    #[error("Failed to declare queue '{queue}': {source}")]
    Declare { queue: String, source: lapin::Error },

    #[error("Failed to publish {url}: {source}")]
    Publish { url: String, source: lapin::Error },

    #[error("Broker refused {url}")]
    Nacked { url: String },

    #[error("Consume failed: {0}")]
    Consume(lapin::Error),

    #[error("Failed to acknowledge delivery: {0}")]
    Ack(lapin::Error),

    #[error("Queue unavailable: {0}")]
    Unavailable(String),
}

/// Sends one URL to the work queue
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes `url` and returns once the broker has accepted it
    async fn publish(&self, url: &Url) -> Result<(), QueueError>;
}

/// A single delivery that must be settled exactly once
#[async_trait]
pub trait Acknowledge: Send {
    /// Raw message body
    fn payload(&self) -> &[u8];

    /// Whether the broker has delivered this message before
    fn redelivered(&self) -> bool {
        false
    }

    /// Marks the message as processed
    async fn ack(self) -> Result<(), QueueError>;

    /// Drops the message without requeueing it
    async fn reject(self) -> Result<(), QueueError>;
}

/// Outcome of waiting on a [`DeliverySource`]
#[derive(Debug)]
pub enum Wait<D> {
    /// A message arrived
    Delivery(D),
    /// The idle timeout elapsed and nothing is pending
    Drained,
    /// The source stopped delivering
    Closed,
}

/// A stream of deliveries with at most one outstanding at a time
#[async_trait]
pub trait DeliverySource: Send {
    type Delivery: Acknowledge;

    /// Next delivery, or `None` once the source has closed
    ///
    /// Must be cancel safe: dropping the future loses no message.
    async fn next_delivery(&mut self) -> Option<Result<Self::Delivery, QueueError>>;

    /// Number of messages waiting in the queue
    async fn pending(&mut self) -> Result<u32, QueueError>;

    /// Waits for a delivery, reporting idle-drain
    ///
    /// Each time `idle_timeout` passes without a delivery the queue is asked
    /// for pending work. Zero pending means the crawl has drained; otherwise
    /// waiting resumes.
    async fn wait(&mut self, idle_timeout: Duration) -> Result<Wait<Self::Delivery>, QueueError> {
        loop {
            match tokio::time::timeout(idle_timeout, self.next_delivery()).await {
                Ok(Some(Ok(delivery))) => return Ok(Wait::Delivery(delivery)),
                Ok(Some(Err(e))) => return Err(e),
                Ok(None) => return Ok(Wait::Closed),
                Err(_) => {
                    let pending = self.pending().await?;
                    if pending == 0 {
                        return Ok(Wait::Drained);
                    }
                    tracing::debug!("Idle timeout with {} messages pending, still waiting", pending);
                }
            }
        }
    }
}

/// Decodes a message body into an absolute URL
pub fn decode_payload(payload: &[u8]) -> Result<Url, String> {
    let text = std::str::from_utf8(payload).map_err(|e| format!("payload is not UTF-8: {}", e))?;
    Url::parse(text.trim()).map_err(|e| format!("'{}' is not an absolute URL: {}", text, e))
}
