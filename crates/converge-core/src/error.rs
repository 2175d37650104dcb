//! Error types for converge-core

use thiserror::Error;

/// Result type alias using converge-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration and bootstrap errors
///
/// Retry outcomes have their own generic error type, see
/// [`crate::retry::RetryError`].
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration value or format
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
