//! Error types for prombolt.

use thiserror::Error;

/// Errors that can occur when building a collector or reading engine statistics.
#[derive(Debug, Error)]
pub enum PromboltError {
    /// The storage engine failed to open a transaction or iterate buckets.
    #[error("engine error: {0}")]
    Engine(String),

    /// Error extracting configuration from figment.
    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration was extracted but cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The Prometheus registry rejected the collector.
    #[error("failed to register collector: {0}")]
    Registration(#[from] prometheus::Error),
}

impl PromboltError {
    /// Create an engine error with the given message.
    pub fn engine<S: Into<String>>(msg: S) -> Self {
        PromboltError::Engine(msg.into())
    }
}

/// Result type alias for prombolt operations.
pub type Result<T> = std::result::Result<T, PromboltError>;
