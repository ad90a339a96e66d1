//! Error types for the tree engine.

use kdpoints_codec::CodecError;
use kdpoints_storage::StorageError;
use thiserror::Error;

/// Result type for tree engine operations.
pub type BkdResult<T> = Result<T, BkdError>;

/// Errors that can occur while building or reading a tree.
#[derive(Debug, Error)]
pub enum BkdError {
    /// Storage error, passed through untouched.
    #[error(transparent)]
    Storage(StorageError),

    /// The bytes of a tree file could not be decoded.
    #[error("codec error: {0}")]
    Codec(CodecError),

    /// The tree structure is inconsistent.
    #[error("corrupt tree: {message}")]
    Corrupt {
        /// Description of the corruption.
        message: String,
    },

    /// The engine does not speak the requested protocol.
    #[error("unsupported tree protocol version: {version}")]
    UnsupportedProtocol {
        /// The requested protocol version.
        version: u32,
    },

    /// The caller passed an invalid argument.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },
}

impl BkdError {
    /// Creates a corruption error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

impl From<StorageError> for BkdError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<CodecError> for BkdError {
    fn from(e: CodecError) -> Self {
        // Keep I/O failures distinguishable from bad bytes.
        match e {
            CodecError::Storage(inner) => Self::Storage(inner),
            other => Self::Codec(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_storage_errors_are_unwrapped() {
        let err: BkdError = CodecError::Storage(StorageError::not_found("_0.kdd")).into();
        assert!(matches!(err, BkdError::Storage(StorageError::NotFound { .. })));

        let err: BkdError = CodecError::InvalidUtf8.into();
        assert!(matches!(err, BkdError::Codec(CodecError::InvalidUtf8)));
    }
}
