//! Error types for the points format.

use kdpoints_bkd::BkdError;
use kdpoints_codec::CodecError;
use kdpoints_storage::StorageError;
use thiserror::Error;

/// Result type for points format operations.
pub type PointsResult<T> = Result<T, PointsError>;

/// Errors that can occur while writing or opening a segment's points.
#[derive(Debug, Error)]
pub enum PointsError {
    /// A requested or persisted format version has no entry in the
    /// version table.
    #[error("unsupported points format version: {version}")]
    UnsupportedVersion {
        /// The unrecognized format version.
        version: u32,
    },

    /// A file is inconsistent with its declared layout, or the three
    /// files of a segment disagree.
    #[error("corruption detected in {resource}: {message}")]
    CorruptionDetected {
        /// File (or segment) the corruption was found in.
        resource: String,
        /// Description of the corruption.
        message: String,
    },

    /// Storage error, passed through untouched.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The caller passed an invalid argument.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },
}

impl PointsError {
    /// Creates a corruption error for a resource.
    pub fn corruption(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptionDetected {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Returns true for [`PointsError::CorruptionDetected`].
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::CorruptionDetected { .. })
    }

    /// Returns true for [`PointsError::UnsupportedVersion`].
    #[must_use]
    pub fn is_unsupported_version(&self) -> bool {
        matches!(self, Self::UnsupportedVersion { .. })
    }

    /// Classifies a codec error raised while reading `resource`.
    pub(crate) fn from_codec(resource: &str, err: CodecError) -> Self {
        match err {
            CodecError::Storage(e) => Self::Storage(e),
            other => Self::corruption(resource, other.to_string()),
        }
    }

    /// Classifies a tree engine error raised for `resource`.
    pub(crate) fn from_engine(resource: &str, err: BkdError) -> Self {
        match err {
            BkdError::Storage(e) => Self::Storage(e),
            BkdError::InvalidArgument { message } => Self::InvalidArgument { message },
            BkdError::UnsupportedProtocol { version } => Self::invalid_argument(format!(
                "tree engine does not speak protocol {version}"
            )),
            other @ (BkdError::Codec(_) | BkdError::Corrupt { .. }) => {
                Self::corruption(resource, other.to_string())
            }
        }
    }
}
