//! Crawler module for page fetching and link discovery
//!
//! This module contains the core crawling logic:
//! - HTTP fetching with a bounded timeout
//! - HTML parsing and allowlisted link extraction
//! - The Crawl Step that composes fetch, extract, and scope filter

mod fetcher;
mod parser;
mod step;

pub use fetcher::{build_http_client, fetch_url, FetchResult, TransportErrorKind};
pub use parser::{parse_html, LinkCandidate, ParsedPage, TagAllowlist, TagRule};
pub use step::{CrawlStep, Discovered};
