//! Error types for checkpoint operations

use thiserror::Error;

/// Result type for checkpoint operations
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors that can occur during checkpoint operations
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// Snapshot could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Underlying database failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Storage error that is not a driver error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Rejected before anything was written
    #[error("Invalid checkpoint: {0}")]
    Invalid(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
