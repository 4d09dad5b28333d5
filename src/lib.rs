//! Linkrelay: a queue-mediated web crawler
//!
//! A producer fetches one seed page and publishes every internal link it
//! finds onto a durable AMQP queue. Consumers pull links from that queue,
//! fetch them, and republish the internal links they discover, so the crawl
//! spreads across a site without any process holding the frontier in memory.

pub mod config;
pub mod crawler;
pub mod logging;
pub mod queue;
pub mod roles;
pub mod url;

use thiserror::Error;

/// Main error type for Linkrelay operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Queue error: {0}")]
    Queue(#[from] queue::QueueError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl { url: String, source: ::url::ParseError },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid tag rule: {0}")]
    InvalidTagRule(String),
}

/// Result type alias for Linkrelay operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlStep, TagAllowlist};
pub use crate::url::is_internal;
