//! Broker configuration
//!
//! Loaded in layers, later layers overriding earlier ones:
//!
//! 1. built-in defaults (every field has one)
//! 2. base TOML file
//! 3. `<base dir>/environments/<environment>.toml`, if present
//! 4. `BROKER_` environment variables, sections split by `__`
//!    (`BROKER_CODEC__MAX_FRAME_SIZE=1048576`)
//!
//! ```toml
//! [wildcard]
//! routing_enabled = true
//! delimiter = "."
//! single_word = "*"
//! any_words = "#"
//!
//! [codec]
//! max_frame_size = 10485760
//!
//! [replication]
//! large_message_dir = "${BROKER_DATA}/large-messages"
//! scratch_buffer_size = 102400
//!
//! [logging]
//! level = "info"
//! json = false
//! ```

use crate::error::{ConfigError, ConfigResult};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const ENV_PREFIX: &str = "BROKER";
pub const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub wildcard: WildcardSettings,
    pub codec: CodecSettings,
    pub replication: ReplicationSettings,
    pub logging: LoggingConfig,
}

/// Address syntax and whether pattern routing is on
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct WildcardSettings {
    /// When false, messages are routed by exact address only
    pub routing_enabled: bool,
    pub delimiter: char,
    pub single_word: char,
    pub any_words: char,
}

impl Default for WildcardSettings {
    fn default() -> Self {
        Self {
            routing_enabled: true,
            delimiter: '.',
            single_word: '*',
            any_words: '#',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CodecSettings {
    /// Largest accepted frame, length prefix excluded
    pub max_frame_size: usize,
}

impl Default for CodecSettings {
    fn default() -> Self {
        Self {
            max_frame_size: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReplicationSettings {
    pub large_message_dir: PathBuf,
    /// Copy buffer used when merging buffered large message bytes
    pub scratch_buffer_size: usize,
}

impl Default for ReplicationSettings {
    fn default() -> Self {
        Self {
            large_message_dir: PathBuf::from("./data/large-messages"),
            scratch_buffer_size: 100 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence when set
    pub level: String,
    pub json: bool,
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            with_target: true,
        }
    }
}

/// Builder for the layered load; tests inject the environment map
#[derive(Debug, Default)]
pub struct ConfigLoader {
    base: Option<PathBuf>,
    environment: Option<String>,
    env_vars: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base TOML file; required once set
    pub fn base_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.base = Some(path.into());
        self
    }

    /// Deployment environment whose overlay file is merged on top
    pub fn environment(mut self, name: impl Into<String>) -> Self {
        self.environment = Some(name.into());
        self
    }

    /// Read `BROKER_` variables from this map instead of the process
    pub fn env_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.env_vars = Some(vars);
        self
    }

    pub fn load(self) -> ConfigResult<BrokerConfig> {
        let mut builder = Config::builder();

        if let Some(base) = &self.base {
            debug!("Loading base config: {:?}", base);
            builder = builder.add_source(File::from(base.as_path()).required(true));
        }

        if let Some(env) = &self.environment {
            let dir = self
                .base
                .as_deref()
                .and_then(Path::parent)
                .unwrap_or_else(|| Path::new("config"));
            let env_file = dir.join("environments").join(format!("{}.toml", env));

            if env_file.exists() {
                info!("Loading environment config: {:?}", env_file);
                builder = builder.add_source(File::from(env_file));
            } else {
                warn!("Environment config not found: {:?}", env_file);
            }
        }

        let mut env_source = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator(ENV_SEPARATOR)
            .try_parsing(true);
        if let Some(vars) = self.env_vars {
            env_source = env_source.source(Some(vars.into_iter().collect()));
        }
        builder = builder.add_source(env_source);

        let mut config: BrokerConfig = builder.build()?.try_deserialize()?;
        config.expand_paths()?;
        config.validate()?;
        Ok(config)
    }
}

impl BrokerConfig {
    /// Load `base` (if any) with the overlay for `environment` and the
    /// process environment
    pub fn load(base: Option<&Path>, environment: Option<&str>) -> ConfigResult<Self> {
        let mut loader = ConfigLoader::new();
        if let Some(base) = base {
            loader = loader.base_file(base);
        }
        if let Some(env) = environment {
            loader = loader.environment(env);
        }
        loader.load()
    }

    /// Expand `$VAR` / `${VAR}` and `~` in path settings
    pub fn expand_paths(&mut self) -> ConfigResult<()> {
        let raw = self.replication.large_message_dir.to_string_lossy().into_owned();
        let expanded = shellexpand::full(&raw).map_err(|source| ConfigError::Expand {
            value: raw.clone(),
            source,
        })?;
        self.replication.large_message_dir = PathBuf::from(expanded.as_ref());
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let w = &self.wildcard;
        if w.single_word == w.any_words {
            return Err(ConfigError::invalid(
                "wildcard",
                format!("single_word and any_words are both '{}'", w.single_word),
            ));
        }
        if w.delimiter == w.single_word || w.delimiter == w.any_words {
            return Err(ConfigError::invalid(
                "wildcard.delimiter",
                format!("'{}' is also a wildcard character", w.delimiter),
            ));
        }
        if self.codec.max_frame_size == 0 {
            return Err(ConfigError::invalid("codec.max_frame_size", "must be positive"));
        }
        if self.replication.scratch_buffer_size == 0 {
            return Err(ConfigError::invalid(
                "replication.scratch_buffer_size",
                "must be positive",
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid("logging.level", "must not be empty"));
        }
        Ok(())
    }

    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BrokerConfig::default();
        config.validate().unwrap();
        assert!(config.wildcard.routing_enabled);
        assert_eq!(config.codec.max_frame_size, 10 * 1024 * 1024);
    }

    #[test]
    fn test_validate_rejects_clashing_wildcards() {
        let mut config = BrokerConfig::default();
        config.wildcard.any_words = '*';
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "wildcard", .. })
        ));

        let mut config = BrokerConfig::default();
        config.wildcard.delimiter = '#';
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "wildcard.delimiter", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let mut config = BrokerConfig::default();
        config.codec.max_frame_size = 0;
        assert!(config.validate().is_err());

        let mut config = BrokerConfig::default();
        config.replication.scratch_buffer_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_render_parses_back() {
        let config = BrokerConfig::default();
        let text = config.to_toml().unwrap();
        let parsed: BrokerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
