//! Producer and Consumer roles
//!
//! Both roles run the same [`CrawlStep`](crate::crawler::CrawlStep) and push
//! what it yields through a [`Publisher`]; they differ in where URLs come
//! from and how long they live.

mod consumer;
mod producer;

pub use consumer::{Consumer, ConsumerExit, WorkerState};
pub use producer::Producer;

use crate::config::Config;
use crate::crawler::{build_http_client, CrawlStep};
use crate::queue::{AmqpGateway, Publisher};
use crate::CrawlError;
use std::fmt;
use std::future::Future;
use url::Url;

/// Counters reported when a role stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Messages received from the queue
    pub deliveries: u64,

    /// Internal links yielded by crawl steps
    pub discovered: u64,

    /// Links accepted by the broker
    pub published: u64,

    /// Links lost because publishing failed
    pub publish_failures: u64,

    /// Deliveries dropped as malformed
    pub rejected: u64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} deliveries, {} links discovered, {} published, {} failed, {} rejected",
            self.deliveries, self.discovered, self.published, self.publish_failures, self.rejected
        )
    }
}

/// Publishes every discovered link, logging failures without stopping
///
/// Returns the number of links that were published.
pub(crate) async fn publish_all<P, I>(publisher: &P, links: I, summary: &mut RunSummary) -> u64
where
    P: Publisher + ?Sized,
    I: IntoIterator<Item = Url>,
{
    let mut published = 0;

    for url in links {
        summary.discovered += 1;
        match publisher.publish(&url).await {
            Ok(()) => {
                summary.published += 1;
                published += 1;
            }
            Err(e) => {
                summary.publish_failures += 1;
                tracing::error!("Failed to publish {}: {}", url, e);
            }
        }
    }

    published
}

/// Runs the Producer role end to end against the configured broker
///
/// Connects lazily, so a seed that yields no links never touches the
/// broker. Returns `None` if `shutdown` resolved before the step finished.
pub async fn run_producer<F>(
    config: &Config,
    seed: &str,
    shutdown: F,
) -> Result<Option<RunSummary>, CrawlError>
where
    F: Future<Output = ()>,
{
    let seed = Url::parse(seed).map_err(|source| CrawlError::InvalidUrl {
        url: seed.to_string(),
        source,
    })?;

    let client = build_http_client(&config.http)?;
    let step = CrawlStep::new(client, &config.producer)?;
    let gateway = AmqpGateway::new(config.broker.clone());
    let producer = Producer::new(step, &gateway);

    let summary = tokio::select! {
        summary = producer.run(&seed) => Some(summary),
        _ = shutdown => {
            tracing::info!("Producer stopped by user");
            None
        }
    };

    gateway.close().await;
    Ok(summary)
}

/// Runs the Consumer role until the queue drains or `shutdown` resolves
///
/// The broker connection is released on every exit path. A consume failure
/// is returned as an error so the process can exit and be restarted.
pub async fn run_consumer<F>(
    config: &Config,
    shutdown: F,
) -> Result<(ConsumerExit, RunSummary), CrawlError>
where
    F: Future<Output = ()>,
{
    let client = build_http_client(&config.http)?;
    let step = CrawlStep::new(client, &config.consumer)?;

    let gateway = AmqpGateway::connect(config.broker.clone()).await?;
    let mut subscription = match gateway.subscribe().await {
        Ok(subscription) => subscription,
        Err(e) => {
            gateway.close().await;
            return Err(e.into());
        }
    };

    let mut consumer = Consumer::new(step, &gateway, config.broker.idle_timeout());
    let outcome = consumer.run(&mut subscription, shutdown).await;

    subscription.close().await;
    gateway.close().await;

    let exit = outcome?;
    Ok((exit, *consumer.summary()))
}

/// Resolves when the process is asked to stop (Ctrl-C, or SIGTERM on unix)
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
