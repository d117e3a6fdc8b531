//! Configuration error types

use thiserror::Error;

/// Configuration result type
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// A setting the operation needs is absent (for example no GOPATH anywhere)
    #[error("Missing setting '{key}': {message}")]
    MissingSetting { key: String, message: String },

    #[error("File watching error: {0}")]
    Watch(#[from] notify::Error),
}

impl ConfigError {
    /// Name of the setting the user should open to fix this error, if any
    pub fn settings_key(&self) -> Option<&str> {
        match self {
            ConfigError::MissingSetting { key, .. } => Some(key),
            _ => None,
        }
    }
}
