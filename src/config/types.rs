use std::time::Duration;

/// Main configuration structure for Linkrelay
///
/// Built once at process entry and passed by reference into every component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub broker: BrokerConfig,
    pub producer: StepConfig,
    pub consumer: StepConfig,
    pub http: HttpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            producer: StepConfig::producer(),
            consumer: StepConfig::consumer(),
            http: HttpConfig::default(),
        }
    }
}

/// Message broker connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub vhost: String,

    /// Name of the durable work queue
    pub queue: String,

    /// Seconds the consumer waits for a delivery before checking for drain
    pub idle_timeout_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            username: "guest".to_string(),
            password: "guest".to_string(),
            vhost: "/".to_string(),
            queue: "links_queue".to_string(),
            idle_timeout_secs: 30,
        }
    }
}

impl BrokerConfig {
    /// URI with the password masked, for logging
    pub fn display_uri(&self) -> String {
        format!(
            "amqp://{}:***@{}:{}/{}",
            self.username, self.host, self.port, self.vhost
        )
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Settings for one Crawl Step role (seeding or propagating)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepConfig {
    /// Total timeout of a single page fetch, in seconds
    pub timeout_secs: u64,

    /// URL-bearing `tag[attribute]` rules scanned on each page
    pub tags: Vec<String>,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self::producer()
    }
}

impl StepConfig {
    /// Seeding defaults: anchors only, 60 second fetch bound
    pub fn producer() -> Self {
        Self {
            timeout_secs: 60,
            tags: vec!["a[href]".to_string()],
        }
    }

    /// Propagating defaults: anchors plus media tags, 300 second fetch bound
    pub fn consumer() -> Self {
        Self {
            timeout_secs: 300,
            tags: ["a", "img", "video", "audio", "source"]
                .iter()
                .map(|tag| format!("{}[href]", tag))
                .collect(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// HTTP transport settings shared by both roles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub user_agent: String,

    /// Follow up to 10 redirects; links are still resolved against the requested URL
    pub follow_redirects: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("linkrelay/{}", env!("CARGO_PKG_VERSION")),
            follow_redirects: true,
        }
    }
}
