//! Error types for the weather gate service.

use thiserror::Error;

use crate::ratelimit::StoreError;

/// Main error type for weather gate operations.
#[derive(Error, Debug)]
pub enum WeatherGateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Counter store errors
    #[error("Counter store error: {0}")]
    Store(#[from] StoreError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for WeatherGateError {
    fn from(err: config::ConfigError) -> Self {
        WeatherGateError::Config(err.to_string())
    }
}

/// Result type alias for weather gate operations.
pub type Result<T> = std::result::Result<T, WeatherGateError>;
