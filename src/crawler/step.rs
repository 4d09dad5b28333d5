//! The Crawl Step: one URL in, a lazy sequence of internal URLs out
//!
//! Both roles run the same step; they differ only in the [`StepConfig`]
//! (fetch timeout and tag allowlist) they build it from.

use crate::config::StepConfig;
use crate::crawler::fetcher::{fetch_url, FetchResult};
use crate::crawler::parser::{parse_html, LinkCandidate, TagAllowlist};
use crate::url::is_internal;
use crate::ConfigError;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Fetch, extract, and scope-filter for one role
#[derive(Debug, Clone)]
pub struct CrawlStep {
    client: Client,
    timeout: Duration,
    allowlist: TagAllowlist,
}

impl CrawlStep {
    /// Builds a crawl step from a role's configuration
    ///
    /// The client is shared; clones of a `reqwest::Client` reuse one pool.
    pub fn new(client: Client, config: &StepConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            client,
            timeout: config.timeout(),
            allowlist: TagAllowlist::parse(&config.tags)?,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn allowlist(&self) -> &TagAllowlist {
        &self.allowlist
    }

    /// Runs one crawl step for `url`
    ///
    /// A non-200 response or a transport failure is logged and produces an
    /// empty sequence; it is never an error for the caller. Extraction
    /// happens once the body arrives, scope filtering happens lazily as the
    /// returned iterator is consumed.
    pub async fn crawl(&self, url: &Url) -> Discovered {
        let body = match fetch_url(&self.client, url, self.timeout).await {
            FetchResult::Success { body, final_url } => {
                if final_url != url.as_str() {
                    tracing::debug!("{} redirected to {}", url, final_url);
                }
                body
            }
            FetchResult::HttpStatus { status_code } => {
                tracing::warn!("Failed to load page: {} (status {})", url, status_code);
                return Discovered::empty(url);
            }
            FetchResult::Transport { kind, error } => {
                tracing::error!("Error fetching page {} ({}): {}", url, kind, error);
                return Discovered::empty(url);
            }
        };

        let parsed = parse_html(&body, url, &self.allowlist);
        tracing::info!(
            "Processing page: {} ({})",
            parsed.title.as_deref().unwrap_or("untitled"),
            url
        );

        Discovered {
            base: url.clone(),
            candidates: parsed.links.into_iter(),
        }
    }
}

/// Internal links discovered by one crawl step
///
/// Yields each internal link once per occurrence on the page, in document
/// order. External links are dropped silently.
#[derive(Debug)]
pub struct Discovered {
    base: Url,
    candidates: std::vec::IntoIter<LinkCandidate>,
}

impl Discovered {
    fn empty(base: &Url) -> Self {
        Self {
            base: base.clone(),
            candidates: Vec::new().into_iter(),
        }
    }

    /// The page the links were found on
    pub fn source(&self) -> &Url {
        &self.base
    }
}

impl Iterator for Discovered {
    type Item = Url;

    fn next(&mut self) -> Option<Url> {
        for candidate in self.candidates.by_ref() {
            if !is_internal(&self.base, &candidate.url) {
                continue;
            }

            let label = match (&candidate.text, candidate.tag.as_str()) {
                (Some(text), _) => text.as_str(),
                (None, "a") => "no description",
                (None, _) => "media",
            };
            tracing::info!("Found link: {} ({})", label, candidate.url);

            return Some(candidate.url);
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.candidates.size_hint().1)
    }
}
