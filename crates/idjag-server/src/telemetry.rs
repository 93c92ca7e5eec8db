//! Tracing subscriber setup

use tracing_subscriber::{
    Registry, filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::config::LoggingConfig;

/// Telemetry initialization errors
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The filter directive does not parse
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),
    /// A global subscriber is already installed
    #[error("Failed to install tracing subscriber: {0}")]
    AlreadyInitialized(String),
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over [`LoggingConfig::level`].
///
/// # Errors
///
/// Returns [`TelemetryError`] if the level is invalid or a subscriber is
/// already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| TelemetryError::InvalidLevel(e.to_string()))?;

    let registry = Registry::default().with(env_filter);

    // Each combination is a distinct layer type
    let result = match (config.json, config.stderr) {
        (true, true) => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .json(),
            )
            .try_init(),
        (true, false) => registry
            .with(fmt::layer().with_target(true).json())
            .try_init(),
        (false, true) => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .pretty(),
            )
            .try_init(),
        (false, false) => registry
            .with(fmt::layer().with_target(true).pretty())
            .try_init(),
    };

    result.map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))
}
