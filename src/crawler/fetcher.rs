//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler:
//! - Building the shared HTTP client with the configured user agent
//! - Bounded-time GET requests
//! - Classifying non-200 responses and transport failures
//!
//! Redirects follow the transport default (at most 10 hops) unless disabled
//! in configuration. Links are always resolved against the URL that was
//! requested, not the final URL after redirects.

use crate::config::HttpConfig;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// The server answered 200 OK
    Success {
        /// Final URL after redirects
        final_url: String,
        /// Page body content
        body: String,
    },

    /// The server answered with any status other than 200
    HttpStatus {
        /// The HTTP status code
        status_code: u16,
    },

    /// No usable response (connection refused, timeout, body read failure)
    Transport {
        /// Error classification
        kind: TransportErrorKind,
        /// Error description
        error: String,
    },
}

impl FetchResult {
    /// Returns the body if the fetch succeeded
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Success { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Classification of transport failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Redirect,
    Body,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Redirect => "redirect",
            Self::Body => "body",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Builds an HTTP client with proper configuration
///
/// The client carries no cookie store, so no session state persists
/// between requests. Per-request timeouts are applied in [`fetch_url`].
///
/// # Example
///
/// ```no_run
/// use linkrelay::config::HttpConfig;
/// use linkrelay::crawler::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    let redirect = if config.follow_redirects {
        Policy::limited(10)
    } else {
        Policy::none()
    };

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .redirect(redirect)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL with a bounded total timeout
///
/// Never fails: every outcome, including transport errors, is described by
/// the returned [`FetchResult`] and the caller decides what to do with it.
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
/// * `timeout` - Total time allowed for the request and body
pub async fn fetch_url(client: &Client, url: &Url, timeout: Duration) -> FetchResult {
    let response = match client.get(url.clone()).timeout(timeout).send().await {
        Ok(response) => response,
        Err(e) => return classify_error(e),
    };

    let status = response.status();
    if status != StatusCode::OK {
        return FetchResult::HttpStatus {
            status_code: status.as_u16(),
        };
    }

    let final_url = response.url().to_string();
    match response.text().await {
        Ok(body) => FetchResult::Success { final_url, body },
        Err(e) if e.is_timeout() => FetchResult::Transport {
            kind: TransportErrorKind::Timeout,
            error: e.to_string(),
        },
        Err(e) => FetchResult::Transport {
            kind: TransportErrorKind::Body,
            error: e.to_string(),
        },
    }
}

fn classify_error(e: reqwest::Error) -> FetchResult {
    let kind = if e.is_timeout() {
        TransportErrorKind::Timeout
    } else if e.is_connect() {
        TransportErrorKind::Connect
    } else if e.is_redirect() {
        TransportErrorKind::Redirect
    } else {
        TransportErrorKind::Other
    };

    FetchResult::Transport {
        kind,
        error: e.to_string(),
    }
}
