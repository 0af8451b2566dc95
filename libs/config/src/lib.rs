//! # Broker Configuration
//!
//! Layered configuration for the data plane (defaults, TOML file,
//! environment overlay file, `BROKER_` variables) and the tracing
//! subscriber setup every entry point shares.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use broker_config::{init_logging, BrokerConfig};
//! use std::path::Path;
//!
//! let config = BrokerConfig::load(Some(Path::new("config/broker.toml")), Some("production"))?;
//! init_logging(&config.logging)?;
//! # Ok::<(), broker_config::ConfigError>(())
//! ```

pub mod error;
pub mod logging;
pub mod settings;

pub use error::{ConfigError, ConfigResult};
pub use logging::{build_filter, init_logging};
pub use settings::{
    BrokerConfig, CodecSettings, ConfigLoader, LoggingConfig, ReplicationSettings,
    WildcardSettings, ENV_PREFIX, ENV_SEPARATOR,
};
