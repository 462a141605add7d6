//! Subscriber setup for the server binary.

use anyhow::{Context, Result};
use scrapectl::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

/// Installs the global subscriber. `RUST_LOG` wins over the configured
/// level; `log` records from the library are bridged into tracing.
pub fn init(config: &LoggingConfig) -> Result<()> {
    tracing_log::LogTracer::init().context("Failed to bridge log records")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json()),
        ),
        LogFormat::Text => tracing::subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer()),
        ),
    }
    .context("Failed to install tracing subscriber")
}
