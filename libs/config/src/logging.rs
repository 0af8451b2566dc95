//! Tracing subscriber setup

use crate::error::{ConfigError, ConfigResult};
use crate::settings::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG` when set, otherwise from the configured level
pub fn build_filter(config: &LoggingConfig) -> ConfigResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|e| ConfigError::LogFilter {
        filter: config.level.clone(),
        reason: e.to_string(),
    })
}

/// Install the global fmt subscriber
///
/// Returns `Ok(false)` when a global subscriber was already installed, so
/// calling this from several entry points (or tests) is harmless.
pub fn init_logging(config: &LoggingConfig) -> ConfigResult<bool> {
    let filter = build_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target);

    let installed = if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };
    Ok(installed)
}
