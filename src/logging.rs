//! Logging setup shared by both binaries

use tracing_subscriber::EnvFilter;

/// Crates whose logs follow the verbosity flags
const OWN_TARGETS: [&str; 3] = ["linkrelay", "linkrelay_producer", "linkrelay_consumer"];

/// Builds the filter for a verbosity level
///
/// `RUST_LOG` wins when no flag was given.
pub fn build_filter(verbose: u8, quiet: bool) -> EnvFilter {
    if quiet {
        // Only show errors
        return EnvFilter::new("error");
    }

    if verbose == 0 {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return filter;
        }
    }

    let (own, rest) = match verbose {
        0 => ("info", "warn"),
        1 => ("debug", "info"),
        2 => ("trace", "debug"),
        _ => return EnvFilter::new("trace"),
    };

    let directives = OWN_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, own))
        .chain(std::iter::once(rest.to_string()))
        .collect::<Vec<_>>()
        .join(",");
    EnvFilter::new(directives)
}

/// Sets up the tracing subscriber based on verbosity level
///
/// Output is one line per event: timestamp, level, message.
pub fn init_logging(verbose: u8, quiet: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(verbose, quiet))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}
