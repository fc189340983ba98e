//! Error types for the updater console

use thiserror::Error;

/// Main error type for the updater console
#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// No response was received at all
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The server answered with a non-2xx status
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Rejected before any request was sent
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Busy: {0}")]
    Busy(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConsoleError {
    /// Text suitable for an inline status message
    pub fn user_message(&self) -> String {
        match self {
            ConsoleError::ServerError { message, .. } => message.clone(),
            ConsoleError::ValidationError(msg)
            | ConsoleError::NetworkError(msg)
            | ConsoleError::ParseError(msg)
            | ConsoleError::Busy(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
