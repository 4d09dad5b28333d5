use crate::config::types::{Config, StepConfig};
use crate::config::validation::validate;
use crate::ConfigError;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::str::FromStr;

/// Environment variable naming an optional TOML configuration file
pub const CONFIG_PATH_VAR: &str = "LINKRELAY_CONFIG";

/// Optional overlay read from a TOML file; absent keys keep their defaults
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    broker: FileBroker,
    producer: FileStep,
    consumer: FileStep,
    http: FileHttp,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
struct FileBroker {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    vhost: Option<String>,
    queue: Option<String>,
    idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
struct FileStep {
    timeout_secs: Option<u64>,
    tags: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
struct FileHttp {
    user_agent: Option<String>,
    follow_redirects: Option<bool>,
}

/// Loads the process configuration
///
/// Values are layered in increasing precedence: built-in defaults, the TOML
/// file at `path` (if any), then environment variables. A `.env` file in the
/// working directory is loaded first but never overrides real environment
/// variables.
///
/// # Arguments
///
/// * `path` - Optional path to a TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to read, parse, or validate the configuration
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    if let Ok(env_file) = dotenvy::dotenv() {
        tracing::debug!("Loaded environment from {}", env_file.display());
    }

    let from_env = std::env::var(CONFIG_PATH_VAR).ok();
    let path = path.or_else(|| from_env.as_deref().map(Path::new));

    load_config_from(path, |key| std::env::var(key).ok())
}

/// Loads configuration using `lookup` in place of the process environment
pub fn load_config_from<F>(path: Option<&Path>, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = Config::default();

    if let Some(path) = path {
        let content = std::fs::read_to_string(path)?;
        let file: FileConfig = toml::from_str(&content)?;
        apply_file(&mut config, file);
    }

    apply_env(&mut config, &lookup)?;
    validate(&config)?;

    Ok(config)
}

/// Loads a configuration and returns both the config and its fingerprint
pub fn load_config_with_hash(path: Option<&Path>) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(&config);
    Ok((config, hash))
}

/// Computes a SHA-256 fingerprint of the effective configuration
///
/// The broker password is left out so the hash can be logged freely.
pub fn compute_config_hash(config: &Config) -> String {
    let canonical = format!(
        "broker={}@{}:{}{}#{}:{}|producer={}:{}|consumer={}:{}|http={}:{}",
        config.broker.username,
        config.broker.host,
        config.broker.port,
        config.broker.vhost,
        config.broker.queue,
        config.broker.idle_timeout_secs,
        config.producer.timeout_secs,
        config.producer.tags.join(","),
        config.consumer.timeout_secs,
        config.consumer.tags.join(","),
        config.http.user_agent,
        config.http.follow_redirects,
    );

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

fn apply_file(config: &mut Config, file: FileConfig) {
    let broker = &mut config.broker;
    let FileBroker {
        host,
        port,
        username,
        password,
        vhost,
        queue,
        idle_timeout_secs,
    } = file.broker;

    if let Some(host) = host {
        broker.host = host;
    }
    if let Some(port) = port {
        broker.port = port;
    }
    if let Some(username) = username {
        broker.username = username;
    }
    if let Some(password) = password {
        broker.password = password;
    }
    if let Some(vhost) = vhost {
        broker.vhost = vhost;
    }
    if let Some(queue) = queue {
        broker.queue = queue;
    }
    if let Some(secs) = idle_timeout_secs {
        broker.idle_timeout_secs = secs;
    }

    apply_file_step(&mut config.producer, file.producer);
    apply_file_step(&mut config.consumer, file.consumer);

    if let Some(user_agent) = file.http.user_agent {
        config.http.user_agent = user_agent;
    }
    if let Some(follow) = file.http.follow_redirects {
        config.http.follow_redirects = follow;
    }
}

fn apply_file_step(step: &mut StepConfig, file: FileStep) {
    if let Some(secs) = file.timeout_secs {
        step.timeout_secs = secs;
    }
    if let Some(tags) = file.tags {
        step.tags = tags;
    }
}

fn apply_env<F>(config: &mut Config, lookup: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let broker = &mut config.broker;
    if let Some(host) = lookup("RABBITMQ_HOST") {
        broker.host = host;
    }
    if let Some(port) = parse_var(lookup, "RABBITMQ_PORT")? {
        broker.port = port;
    }
    if let Some(user) = lookup("RABBITMQ_USER") {
        broker.username = user;
    }
    if let Some(password) = lookup("RABBITMQ_PASSWORD") {
        broker.password = password;
    }
    if let Some(vhost) = lookup("RABBITMQ_VHOST") {
        broker.vhost = vhost;
    }
    if let Some(queue) = lookup("RABBITMQ_QUEUE") {
        broker.queue = queue;
    }
    if let Some(secs) = parse_var(lookup, "QUEUE_TIMEOUT")? {
        broker.idle_timeout_secs = secs;
    }

    if let Some(secs) = parse_var(lookup, "PRODUCER_TIMEOUT")? {
        config.producer.timeout_secs = secs;
    }
    if let Some(tags) = lookup("PRODUCER_TAGS") {
        config.producer.tags = split_tags(&tags);
    }
    if let Some(secs) = parse_var(lookup, "CONSUMER_TIMEOUT")? {
        config.consumer.timeout_secs = secs;
    }
    if let Some(tags) = lookup("CONSUMER_TAGS") {
        config.consumer.tags = split_tags(&tags);
    }

    if let Some(user_agent) = lookup("HTTP_USER_AGENT") {
        config.http.user_agent = user_agent;
    }
    if let Some(raw) = lookup("HTTP_FOLLOW_REDIRECTS") {
        config.http.follow_redirects = parse_bool("HTTP_FOLLOW_REDIRECTS", &raw)?;
    }

    Ok(())
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|rule| !rule.is_empty())
        .map(str::to_string)
        .collect()
}
