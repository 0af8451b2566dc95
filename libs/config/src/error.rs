use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config_crate::ConfigError),

    #[error("Invalid configuration: {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Failed to expand '{value}': {source}")]
    Expand {
        value: String,
        #[source]
        source: shellexpand::LookupError<std::env::VarError>,
    },

    #[error("Failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("Invalid log filter '{filter}': {reason}")]
    LogFilter { filter: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
