use thiserror::Error;

use crate::gateway::GatewayError;

/// Adapter error types
#[derive(Error, Debug)]
pub enum Error {
    /// Storage (Redis or in-memory backend) errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Errors reported by the WebSocket gateway client
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Protocol violations that cannot be expressed as a close code
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Errors raised by the GraphQL execution adapter
    #[error("Execution error: {0}")]
    Execution(String),

    /// Invalid caller input
    #[error("Validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Whether this error is the gateway reporting a permanently closed
    /// connection (HTTP 410).
    pub fn is_gone(&self) -> bool {
        matches!(self, Error::Gateway(err) if err.is_gone())
    }
}

/// Conversion from redis::RedisError
impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Storage(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
