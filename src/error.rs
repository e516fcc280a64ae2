//! Error types for Cartograph.
//!
//! "Nothing found" is never an error here: lookups return `Option` or a
//! `found: false` response. Errors are reserved for storage, timeouts and
//! malformed input.

use thiserror::Error;

/// Library-wide result alias.
pub type Result<T> = std::result::Result<T, CartographError>;

#[derive(Debug, Error)]
pub enum CartographError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    SerializeError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    /// A backing-store call exceeded its configured deadline.
    #[error("storage operation '{operation}' timed out after {timeout_ms}ms")]
    Timeout { operation: &'static str, timeout_ms: u64 },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<serde_json::Error> for CartographError {
    fn from(e: serde_json::Error) -> Self {
        CartographError::ParseError(format!("json: {}", e))
    }
}
