//! In-process queue with the same contract as the broker queue
//!
//! Used by tests and local runs. Every publish, ack, and reject is recorded
//! so ordering can be inspected afterwards.

use crate::queue::{Acknowledge, DeliverySource, Publisher, QueueError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use url::Url;

/// Something that happened to the queue, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    Published(String),
    PublishFailed(String),
    Delivered(Vec<u8>),
    Acked(Vec<u8>),
    Rejected(Vec<u8>),
}

#[derive(Debug, Default)]
struct State {
    ready: VecDeque<Vec<u8>>,
    events: Vec<QueueEvent>,
    fail_publishes: bool,
    closed: bool,
}

/// Shared handle to an in-memory queue; clones see the same messages
#[derive(Debug, Clone, Default)]
pub struct MemoryQueue {
    state: Arc<Mutex<State>>,
    notify: Arc<Notify>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves the data intact
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Enqueues a raw message body, bypassing URL encoding
    pub fn push_raw(&self, payload: Vec<u8>) {
        self.lock().ready.push_back(payload);
        self.notify.notify_one();
    }

    /// Makes every following publish fail until reset
    pub fn set_publish_failure(&self, fail: bool) {
        self.lock().fail_publishes = fail;
    }

    /// Stops delivery; waiting subscribers see the source as closed
    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    /// Messages waiting to be delivered
    pub fn len(&self) -> usize {
        self.lock().ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bodies of the waiting messages, as text
    pub fn messages(&self) -> Vec<String> {
        self.lock()
            .ready
            .iter()
            .map(|body| String::from_utf8_lossy(body).into_owned())
            .collect()
    }

    /// Everything that has happened so far
    pub fn events(&self) -> Vec<QueueEvent> {
        self.lock().events.clone()
    }

    /// Opens a consumer on this queue
    pub fn subscribe(&self) -> MemorySubscription {
        MemorySubscription {
            queue: self.clone(),
        }
    }

    fn record(&self, event: QueueEvent) {
        self.lock().events.push(event);
    }
}

#[async_trait]
impl Publisher for MemoryQueue {
    async fn publish(&self, url: &Url) -> Result<(), QueueError> {
        {
            let mut state = self.lock();
            if state.fail_publishes {
                state
                    .events
                    .push(QueueEvent::PublishFailed(url.to_string()));
                return Err(QueueError::Unavailable(format!(
                    "memory queue refused {}",
                    url
                )));
            }
            state.ready.push_back(url.as_str().as_bytes().to_vec());
            state.events.push(QueueEvent::Published(url.to_string()));
        }
        self.notify.notify_one();
        Ok(())
    }
}

/// Consumer side of a [`MemoryQueue`]
#[derive(Debug)]
pub struct MemorySubscription {
    queue: MemoryQueue,
}

#[async_trait]
impl DeliverySource for MemorySubscription {
    type Delivery = MemoryDelivery;

    async fn next_delivery(&mut self) -> Option<Result<MemoryDelivery, QueueError>> {
        loop {
            let notified = self.queue.notify.notified();
            {
                let mut state = self.queue.lock();
                if let Some(payload) = state.ready.pop_front() {
                    state.events.push(QueueEvent::Delivered(payload.clone()));
                    return Some(Ok(MemoryDelivery {
                        payload,
                        queue: self.queue.clone(),
                    }));
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    async fn pending(&mut self) -> Result<u32, QueueError> {
        Ok(self.queue.len() as u32)
    }
}

/// A message taken from a [`MemoryQueue`]
#[derive(Debug)]
pub struct MemoryDelivery {
    payload: Vec<u8>,
    queue: MemoryQueue,
}

#[async_trait]
impl Acknowledge for MemoryDelivery {
    fn payload(&self) -> &[u8] {
        &self.payload
    }

    async fn ack(self) -> Result<(), QueueError> {
        self.queue.record(QueueEvent::Acked(self.payload));
        Ok(())
    }

    async fn reject(self) -> Result<(), QueueError> {
        self.queue.record(QueueEvent::Rejected(self.payload));
        Ok(())
    }
}
