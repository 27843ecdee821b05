//! Tracing subscriber setup for the CLI.

use crate::core::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Install a global subscriber writing to stderr. `RUST_LOG` wins over the
/// configured level; a second call is a no-op.
pub fn init_logging(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if result.is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }
}
