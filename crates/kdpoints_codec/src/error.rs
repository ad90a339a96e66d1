//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Storage error while reading or writing a file.
    #[error(transparent)]
    Storage(#[from] kdpoints_storage::StorageError),

    /// Unexpected end of input.
    #[error("unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        /// Bytes the read required.
        needed: usize,
        /// Bytes left in the input.
        remaining: usize,
    },

    /// Invalid UTF-8 string.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// A variable-length integer ran past its maximum width.
    #[error("malformed variable-length integer")]
    MalformedVarInt,

    /// The header magic did not match.
    #[error("header magic mismatch: expected {expected:08x}, got {actual:08x}")]
    BadMagic {
        /// Expected magic.
        expected: u32,
        /// Magic found in the file.
        actual: u32,
    },

    /// The codec name recorded in the header is not the expected one.
    #[error("codec mismatch: expected {expected:?}, got {actual:?}")]
    CodecMismatch {
        /// Expected codec name.
        expected: String,
        /// Codec name found in the file.
        actual: String,
    },

    /// The header version is outside the accepted range.
    #[error("version {version} outside supported range {min}..={max}")]
    VersionOutOfRange {
        /// Version found in the file.
        version: u32,
        /// Oldest accepted version.
        min: u32,
        /// Newest accepted version.
        max: u32,
    },

    /// The header belongs to another segment.
    #[error("segment id mismatch: expected {expected}, got {actual}")]
    SegmentIdMismatch {
        /// Expected segment id (hex).
        expected: String,
        /// Segment id found in the file (hex).
        actual: String,
    },

    /// The header suffix is not the expected one.
    #[error("segment suffix mismatch: expected {expected:?}, got {actual:?}")]
    SuffixMismatch {
        /// Expected suffix.
        expected: String,
        /// Suffix found in the file.
        actual: String,
    },

    /// The footer is malformed.
    #[error("invalid footer: {message}")]
    InvalidFooter {
        /// Description of the problem.
        message: String,
    },

    /// Checksum mismatch detected.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the footer.
        expected: u32,
        /// Checksum computed over the file.
        actual: u32,
    },

    /// Structurally invalid data.
    #[error("invalid structure: {message}")]
    InvalidStructure {
        /// Description of the structural error.
        message: String,
    },
}

impl CodecError {
    /// Create an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Create an invalid footer error.
    pub fn invalid_footer(message: impl Into<String>) -> Self {
        Self::InvalidFooter {
            message: message.into(),
        }
    }

    /// Returns true if the error came from the storage layer rather than
    /// from the bytes themselves.
    #[must_use]
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
