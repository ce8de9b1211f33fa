//! Tracing subscriber setup

use crate::config::{LogFormat, LoggingConfig};
use crate::{Error, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Build the level filter; `RUST_LOG` wins over the configured level.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| Error::InvalidConfig(format!("Invalid log level {:?}: {}", config.level, e)))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Json => registry.with(fmt::layer().json().with_target(true)).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
    };

    installed.map_err(|e| Error::Other(e.into()))
}
