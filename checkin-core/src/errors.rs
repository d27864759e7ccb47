use thiserror::Error;

/// Result type used across the core crate.
pub type Result<T> = std::result::Result<T, CheckinError>;

/// Canonical error representation shared by the toolkit crates.
#[derive(Debug, Error)]
pub enum CheckinError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    General(String),
}

/// Dedicated configuration error used by the configuration module.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for environment variable {key}: {value}")]
    InvalidValue { key: String, value: String },
}

impl From<ConfigError> for CheckinError {
    fn from(value: ConfigError) -> Self {
        CheckinError::Config(value.to_string())
    }
}
