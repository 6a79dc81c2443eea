//! Error types for storage and tree operations.

use std::io;
use thiserror::Error;

/// Errors surfaced by the persistence layer and every tree operation
/// that touches it.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupted storage: {0}")]
    Corrupted(String),

    #[error("node too large for page: {0} bytes (max {1})")]
    PageOverflow(usize, usize),
}

/// Result type for storage-backed operations
pub type StorageResult<T> = Result<T, StorageError>;
