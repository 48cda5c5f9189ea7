//! Error types for portmapper-logging

use thiserror::Error;

/// Errors that can occur while wiring up logging
#[derive(Debug, Error)]
pub enum LoggingError {
    /// A listener is already bound to the writer
    #[error("a log message listener is already registered")]
    ListenerAlreadyRegistered,

    /// Reading a config file or creating a log file failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid JSON for [`LogConfig`](crate::LogConfig)
    #[error("invalid logging config: {0}")]
    Config(#[from] serde_json::Error),

    /// The global subscriber could not be installed
    #[error("failed to install subscriber: {0}")]
    SubscriberInit(String),
}

/// Result type for logging operations
pub type LoggingResult<T> = Result<T, LoggingError>;
