//! Error types for the token ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// JSON error (audit payloads)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Grant or debit amount was non-positive
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Malformed transaction (zero amount, bad reference, etc.)
    #[error("Validation error: {0}")]
    Validation(String),

    /// User missing from the directory, or marked deleted
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Caller's roles do not cover the requested capability
    #[error("Operation not permitted: {0}")]
    Forbidden(String),

    /// Concurrency error (writer mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
