//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of a file.
    #[error("read beyond end of {name}: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The file being read.
        name: String,
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current file size.
        size: u64,
    },

    /// The file does not exist.
    #[error("file not found: {name}")]
    NotFound {
        /// The missing file name.
        name: String,
    },

    /// A write-once file was created twice.
    #[error("file already exists: {name}")]
    AlreadyExists {
        /// The conflicting file name.
        name: String,
    },

    /// The file name is not usable inside a directory.
    #[error("invalid file name: {name:?}")]
    InvalidName {
        /// The rejected file name.
        name: String,
    },
}

impl StorageError {
    /// Creates a not found error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Creates an already exists error.
    pub fn already_exists(name: impl Into<String>) -> Self {
        Self::AlreadyExists { name: name.into() }
    }
}
