//! Configuration module for Linkrelay
//!
//! Settings are resolved once at process entry from defaults, an optional
//! TOML file, and environment variables, then validated.
//!
//! # Example
//!
//! ```no_run
//! use linkrelay::config::load_config;
//!
//! let config = load_config(None).unwrap();
//! println!("Consuming from queue: {}", config.broker.queue);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{BrokerConfig, Config, HttpConfig, StepConfig};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_from, load_config_with_hash, CONFIG_PATH_VAR,
};
