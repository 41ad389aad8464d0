//! Error types for Missive

use thiserror::Error;

/// Main error type for Missive operations
#[derive(Error, Debug)]
pub enum MissiveError {
    /// A blob upload or root-pointer publish failed.
    ///
    /// Fatal to the enclosing append transaction; the previously published
    /// root pointer remains authoritative.
    #[error("Write failed: {0}")]
    Write(String),

    /// Malformed caller input, rejected before any I/O
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Signing failed (key unusable, signer boundary rejected the request)
    #[error("Signing error: {0}")]
    Signing(String),

    /// Cryptographic operation failed
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Database creation/opening error
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Table error
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    /// Storage operation error
    #[error("Storage operation error: {0}")]
    StorageOp(#[from] redb::StorageError),

    /// Commit error
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid address format
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

/// Result type alias using MissiveError
pub type MissiveResult<T> = Result<T, MissiveError>;
