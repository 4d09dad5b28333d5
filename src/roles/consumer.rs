//! Consumer role: turns queued URLs into more queued URLs
//!
//! A consumer handles one delivery at a time:
//! `Idle -> Processing -> Publishing -> Acknowledging -> Idle`, and stops in
//! `Drained` once the queue stays empty past the idle timeout. A message is
//! only acknowledged after every link it produced has been published.

use crate::crawler::CrawlStep;
use crate::queue::{decode_payload, Acknowledge, DeliverySource, Publisher, QueueError, Wait};
use crate::roles::{publish_all, RunSummary};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use url::Url;

/// Where a consumer is in its delivery cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    /// Waiting for a delivery
    Idle,

    /// Running the crawl step for the current delivery
    Processing,

    /// Publishing links discovered for the current delivery
    Publishing,

    /// Settling the current delivery with the broker
    Acknowledging,

    /// The queue drained; the worker is done
    Drained,
}

impl WorkerState {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Drained)
    }

    /// Returns true if `next` may follow this state
    pub fn can_transition_to(&self, next: WorkerState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Processing)
                | (Self::Idle, Self::Drained)
                | (Self::Processing, Self::Publishing)
                | (Self::Publishing, Self::Acknowledging)
                | (Self::Acknowledging, Self::Idle)
        )
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Processing => "processing",
            Self::Publishing => "publishing",
            Self::Acknowledging => "acknowledging",
            Self::Drained => "drained",
        };
        f.write_str(name)
    }
}

/// Why a consumer stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerExit {
    /// Idle timeout elapsed with nothing pending
    Drained,
    /// A shutdown signal arrived while waiting
    Interrupted,
    /// The delivery source stopped (consumer cancelled by the broker)
    SourceClosed,
}

/// Long-running propagating worker
pub struct Consumer<'a, P: Publisher + ?Sized> {
    step: CrawlStep,
    publisher: &'a P,
    idle_timeout: Duration,
    state: WorkerState,
    history: Vec<WorkerState>,
    summary: RunSummary,
}

impl<'a, P: Publisher + ?Sized> Consumer<'a, P> {
    pub fn new(step: CrawlStep, publisher: &'a P, idle_timeout: Duration) -> Self {
        Self {
            step,
            publisher,
            idle_timeout,
            state: WorkerState::Idle,
            history: vec![WorkerState::Idle],
            summary: RunSummary::default(),
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Every state entered so far, starting with `Idle`
    pub fn history(&self) -> &[WorkerState] {
        &self.history
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    fn transition(&mut self, next: WorkerState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid worker transition {} -> {}",
            self.state,
            next
        );
        tracing::trace!("Worker state: {} -> {}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    /// Consumes deliveries until the queue drains, `shutdown` resolves, or
    /// the source fails
    ///
    /// `shutdown` is only observed while waiting for a delivery, so the
    /// message in flight always finishes its cycle. A queue error ends the
    /// loop and leaves the current delivery unacknowledged for the broker to
    /// redeliver.
    pub async fn run<S, F>(&mut self, source: &mut S, shutdown: F) -> Result<ConsumerExit, QueueError>
    where
        S: DeliverySource,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        tracing::info!("Consumer waiting for messages...");

        loop {
            let waited = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("Consumer stopped by signal");
                    return Ok(ConsumerExit::Interrupted);
                }
                waited = source.wait(self.idle_timeout) => waited?,
            };

            let delivery = match waited {
                Wait::Delivery(delivery) => delivery,
                Wait::Drained => {
                    self.transition(WorkerState::Drained);
                    tracing::info!("Queue is empty, shutting down");
                    return Ok(ConsumerExit::Drained);
                }
                Wait::Closed => {
                    tracing::warn!("Delivery source closed");
                    return Ok(ConsumerExit::SourceClosed);
                }
            };

            self.summary.deliveries += 1;
            self.settle(delivery).await?;
        }
    }

    /// Runs one full delivery cycle, leaving the worker `Idle`
    async fn settle<D: Acknowledge>(&mut self, delivery: D) -> Result<(), QueueError> {
        let url = match decode_payload(delivery.payload()) {
            Ok(url) => url,
            Err(reason) => {
                tracing::error!("Rejecting malformed message: {}", reason);
                delivery.reject().await?;
                self.summary.rejected += 1;
                return Ok(());
            }
        };

        if delivery.redelivered() {
            tracing::info!("Received redelivered link from queue: {}", url);
        } else {
            tracing::info!("Received link from queue: {}", url);
        }

        self.handle(&url).await;

        self.transition(WorkerState::Acknowledging);
        delivery.ack().await?;
        tracing::debug!("Acknowledged {}", url);
        self.transition(WorkerState::Idle);

        Ok(())
    }

    /// Crawls `url` and publishes every internal link it yields
    ///
    /// Returns the number of links published.
    pub async fn handle(&mut self, url: &Url) -> u64 {
        self.transition(WorkerState::Processing);
        let discovered = self.step.crawl(url).await;

        self.transition(WorkerState::Publishing);
        publish_all(self.publisher, discovered, &mut self.summary).await
    }
}
