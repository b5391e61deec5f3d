//! Logging setup for the `eload` binary

use crate::config::LoggingConfig;
use crate::error::{EloadError, Result};
use tracing_subscriber::EnvFilter;

/// Filter directive: `RUST_LOG` wins, then `--debug`, then the configured level
pub fn filter_directive(config: &LoggingConfig, debug: bool, rust_log: Option<&str>) -> String {
    match rust_log {
        Some(directive) if !directive.trim().is_empty() => directive.to_string(),
        _ if debug => "debug".to_string(),
        _ => config.level.clone(),
    }
}

/// Install the global subscriber. Logs go to stderr so command output stays clean.
pub fn init(config: &LoggingConfig, debug: bool) -> Result<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directive = filter_directive(config, debug, rust_log.as_deref());
    let filter = EnvFilter::try_new(&directive)
        .map_err(|e| EloadError::configuration(format!("Invalid log filter '{}': {}", directive, e)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match config.format.as_str() {
        "json" => builder.json().try_init(),
        "pretty" => builder.pretty().try_init(),
        "compact" => builder.compact().try_init(),
        other => {
            return Err(EloadError::configuration(format!(
                "Unknown log format '{}' (expected compact, pretty or json)",
                other
            )))
        }
    };
    installed.map_err(|e| EloadError::configuration(format!("Failed to install logger: {}", e)))
}
