//! Error types for feedbot.

use thiserror::Error;

/// Common error type for feedbot.
#[derive(Error, Debug)]
pub enum BotError {
    /// Storage error.
    ///
    /// Errors from sqlx are automatically converted into this variant.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Feed retrieval failed (network failure, timeout, non-2xx status, oversize body).
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Feed document could not be parsed, or parsed with warnings.
    #[error("parse error: {0}")]
    Parse(String),

    /// Outbound chat API call failed.
    #[error("chat API error: {0}")]
    Chat(String),

    /// Authentication error (webhook token mismatch, missing OAuth token).
    #[error("authentication error: {0}")]
    Auth(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl BotError {
    /// Whether this error originated in the storage layer.
    pub fn is_storage(&self) -> bool {
        matches!(self, BotError::Database(_))
    }

    /// Whether this error means the feed itself is unusable.
    pub fn is_feed_error(&self) -> bool {
        matches!(self, BotError::Fetch(_) | BotError::Parse(_))
    }
}

impl From<sqlx::Error> for BotError {
    fn from(e: sqlx::Error) -> Self {
        BotError::Database(e.to_string())
    }
}

/// Result type alias for feedbot operations.
pub type Result<T> = std::result::Result<T, BotError>;
