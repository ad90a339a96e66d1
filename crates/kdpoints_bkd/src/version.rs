//! Tree engine protocol versions.
//!
//! A protocol version fixes the byte layout of inner nodes and leaf
//! blocks. The engine writes the protocol it was asked to use and refuses
//! to read a tree under any other.

use crate::error::{BkdError, BkdResult};
use std::fmt;

/// Codec name recorded in every per-field tree header.
pub const BKD_CODEC_NAME: &str = "BKD";

/// Per-field metadata moved into its own file.
pub const VERSION_META_FILE: ProtocolVersion = ProtocolVersion(9);

/// 24-bit doc ids stored in a split (low 16 / high 8) layout, and 21-bit
/// doc id packing introduced.
pub const VERSION_VECTORIZE_BPV24_AND_INTRODUCE_BPV21: ProtocolVersion = ProtocolVersion(10);

/// Oldest protocol this engine can read and write.
pub const VERSION_MIN_SUPPORTED: ProtocolVersion = VERSION_META_FILE;

/// Newest protocol this engine can read and write.
pub const VERSION_CURRENT: ProtocolVersion = VERSION_VECTORIZE_BPV24_AND_INTRODUCE_BPV21;

/// A tree engine protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion(u32);

impl ProtocolVersion {
    /// Creates a protocol version from its raw number.
    #[must_use]
    pub const fn new(version: u32) -> Self {
        Self(version)
    }

    /// Returns the raw version number.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns true if this engine can read and write the protocol.
    #[must_use]
    pub const fn is_supported(self) -> bool {
        self.0 >= VERSION_MIN_SUPPORTED.0 && self.0 <= VERSION_CURRENT.0
    }

    /// Fails with [`BkdError::UnsupportedProtocol`] unless supported.
    ///
    /// # Errors
    ///
    /// Returns an error for protocols outside the supported range.
    pub fn ensure_supported(self) -> BkdResult<Self> {
        if self.is_supported() {
            Ok(self)
        } else {
            Err(BkdError::UnsupportedProtocol { version: self.0 })
        }
    }

    /// Whether leaves may pack doc ids in 21 bits.
    #[must_use]
    pub const fn has_bpv21(self) -> bool {
        self.0 >= VERSION_VECTORIZE_BPV24_AND_INTRODUCE_BPV21.0
    }

    /// Whether 24-bit doc ids use the split layout.
    #[must_use]
    pub const fn has_split_bpv24(self) -> bool {
        self.0 >= VERSION_VECTORIZE_BPV24_AND_INTRODUCE_BPV21.0
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_range() {
        assert!(!ProtocolVersion::new(8).is_supported());
        assert!(VERSION_META_FILE.is_supported());
        assert!(VERSION_CURRENT.is_supported());
        assert!(!ProtocolVersion::new(11).is_supported());
        assert!(matches!(
            ProtocolVersion::new(11).ensure_supported(),
            Err(BkdError::UnsupportedProtocol { version: 11 })
        ));
    }

    #[test]
    fn feature_gates() {
        assert!(!VERSION_META_FILE.has_bpv21());
        assert!(!VERSION_META_FILE.has_split_bpv24());
        assert!(VERSION_CURRENT.has_bpv21());
        assert!(VERSION_CURRENT.has_split_bpv24());
    }
}
