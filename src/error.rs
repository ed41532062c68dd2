//! Error types for feedwatch.

use thiserror::Error;

/// Common error type for feedwatch.
#[derive(Error, Debug)]
pub enum FeedwatchError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The feed could not be retrieved (network failure, HTTP status, size limit).
    #[error("fetch error: {0}")]
    Fetch(String),

    /// The feed body was retrieved but is not a readable RSS/Atom document.
    #[error("parse error: {0}")]
    Parse(String),

    /// The feed URL was rejected before any request was made.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration was parsed but holds unusable values.
    #[error("validation error: {0}")]
    Validation(String),

    /// The background poll task ended abnormally.
    #[error("poller error: {0}")]
    Poller(String),
}

/// Result type alias for feedwatch operations.
pub type Result<T> = std::result::Result<T, FeedwatchError>;
