//! Producer role: seeds the queue from one page

use crate::crawler::CrawlStep;
use crate::queue::Publisher;
use crate::roles::{publish_all, RunSummary};
use url::Url;

/// One-shot seeding worker
pub struct Producer<'a, P: Publisher + ?Sized> {
    step: CrawlStep,
    publisher: &'a P,
}

impl<'a, P: Publisher + ?Sized> Producer<'a, P> {
    pub fn new(step: CrawlStep, publisher: &'a P) -> Self {
        Self { step, publisher }
    }

    /// Runs one crawl step on `seed` and publishes every internal link found
    ///
    /// A seed that fails to load publishes nothing; that is not an error.
    pub async fn run(&self, seed: &Url) -> RunSummary {
        tracing::info!("Producer started with seed {}", seed);

        let mut summary = RunSummary::default();
        let discovered = self.step.crawl(seed).await;
        publish_all(self.publisher, discovered, &mut summary).await;

        tracing::info!("Producer finished: {}", summary);
        summary
    }
}
