//! Unified error type for Gatewatch.

use thiserror::Error;

/// Result type alias using GatewatchError.
pub type Result<T> = std::result::Result<T, GatewatchError>;

#[derive(Error, Debug)]
pub enum GatewatchError {
    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Persistence errors
    #[error("Track store error: {0}")]
    Store(String),

    // Collaborator errors
    #[error("Access source error: {0}")]
    AccessSource(String),

    #[error("Notification channel error: {0}")]
    Channel(String),

    #[error("User directory error: {0}")]
    Directory(String),

    // Boundary errors
    #[error("Validation error: {0}")]
    Validation(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl GatewatchError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn access(msg: impl Into<String>) -> Self {
        Self::AccessSource(msg.into())
    }

    pub fn channel(msg: impl Into<String>) -> Self {
        Self::Channel(msg.into())
    }

    pub fn directory(msg: impl Into<String>) -> Self {
        Self::Directory(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether the error was caused by bad client input rather than a
    /// collaborator failure.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Json(_))
    }
}
