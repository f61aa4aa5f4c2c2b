//! Error types for the listsync engine
//!
//! Fetch and parse errors are recovered where they occur (the source or the
//! candidate value is skipped). Store errors propagate out of the ingestion
//! run and are handled by whichever loop or job started it.

use thiserror::Error;

/// Result type alias for listsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the listsync engine
#[derive(Error, Debug)]
pub enum Error {
    /// Fetching a source failed (transport, HTTP status, local file)
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// A candidate value did not parse as a valid entry
    #[error("Parse error: {0}")]
    Parse(String),

    /// Document store errors (connection, serialization, aggregation)
    #[error("Store error: {0}")]
    Store(String),

    /// Cache invalidation errors
    #[error("Cache error: {0}")]
    Cache(String),

    /// Job scheduler errors
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a fetch error
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a cache error
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Create a scheduler error
    pub fn scheduler(msg: impl Into<String>) -> Self {
        Self::Scheduler(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
