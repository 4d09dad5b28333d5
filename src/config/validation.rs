use crate::config::types::{BrokerConfig, Config, HttpConfig, StepConfig};
use crate::crawler::TagAllowlist;
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_broker_config(&config.broker)?;
    validate_step_config("producer", &config.producer)?;
    validate_step_config("consumer", &config.consumer)?;
    validate_http_config(&config.http)?;
    Ok(())
}

/// Validates broker configuration
fn validate_broker_config(config: &BrokerConfig) -> Result<(), ConfigError> {
    if config.host.trim().is_empty() {
        return Err(ConfigError::Validation(
            "broker host cannot be empty".to_string(),
        ));
    }

    if config.port == 0 {
        return Err(ConfigError::Validation(
            "broker port must be greater than 0".to_string(),
        ));
    }

    if config.username.is_empty() {
        return Err(ConfigError::Validation(
            "broker username cannot be empty".to_string(),
        ));
    }

    if config.queue.trim().is_empty() {
        return Err(ConfigError::Validation(
            "queue name cannot be empty".to_string(),
        ));
    }

    // AMQP short strings cap queue names at 255 bytes
    if config.queue.len() > 255 {
        return Err(ConfigError::Validation(format!(
            "queue name must be at most 255 bytes, got {}",
            config.queue.len()
        )));
    }

    if config.idle_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "idle timeout must be at least 1 second".to_string(),
        ));
    }

    Ok(())
}

/// Validates one role's crawl step configuration
fn validate_step_config(role: &str, config: &StepConfig) -> Result<(), ConfigError> {
    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(format!(
            "{} fetch timeout must be at least 1 second",
            role
        )));
    }

    if config.tags.is_empty() {
        return Err(ConfigError::Validation(format!(
            "{} tag allowlist cannot be empty",
            role
        )));
    }

    TagAllowlist::parse(&config.tags)?;

    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}
