//! Error types for Parlor

use thiserror::Error;

/// The main error type for Parlor operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// Missing, malformed or rejected bearer credential
    #[error("Unauthenticated")]
    Unauthenticated,

    /// Login with a password that does not match the registered one
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// `fromId` does not resolve to a stored message
    #[error("Message not found: {0}")]
    CursorNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Document key already taken
    #[error("Message already exists: {0}")]
    Conflict(String),

    /// Backend failure (I/O, LMDB, corrupted document)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for Parlor operations
pub type Result<T> = std::result::Result<T, ChatError>;

/// Convert any backend error to `StoreUnavailable`
pub fn err<E: std::error::Error>(e: E) -> ChatError {
    ChatError::StoreUnavailable(e.to_string())
}
