//! Format versions and the table binding them to tree engine protocols.
//!
//! A format version names the on-disk contract of a segment's points. The
//! tree engine protocol it implies is fixed when the version is
//! introduced and never changes afterwards: new layouts get new entries,
//! old entries stay so that old segments keep resolving to the protocol
//! they were written with.

use crate::error::{PointsError, PointsResult};
use kdpoints_bkd::{ProtocolVersion, VERSION_META_FILE, VERSION_VECTORIZE_BPV24_AND_INTRODUCE_BPV21};
use std::fmt;

/// A points format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FormatVersion(u32);

impl FormatVersion {
    /// Creates a format version from its raw number.
    #[must_use]
    pub const fn new(version: u32) -> Self {
        Self(version)
    }

    /// Returns the raw version number.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for FormatVersion {
    fn from(version: u32) -> Self {
        Self(version)
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// First points format.
pub const VERSION_START: FormatVersion = FormatVersion(0);

/// Leaves may use 21-bit and split 24-bit doc id blocks.
pub const VERSION_BKD_VECTORIZED_BPV24: FormatVersion = FormatVersion(1);

/// Version written by default.
pub const VERSION_CURRENT: FormatVersion = VERSION_BKD_VECTORIZED_BPV24;

/// Every format version ever written, with the protocol it is bound to.
///
/// Append only. Ordered by format version; the last entry is current.
pub static VERSION_TABLE: &[(FormatVersion, ProtocolVersion)] = &[
    (VERSION_START, VERSION_META_FILE),
    (
        VERSION_BKD_VECTORIZED_BPV24,
        VERSION_VECTORIZE_BPV24_AND_INTRODUCE_BPV21,
    ),
];

/// Resolves the tree engine protocol bound to `version`.
///
/// # Errors
///
/// Returns [`PointsError::UnsupportedVersion`] if the version has no
/// table entry, including versions that fall between known entries.
pub fn resolve(version: FormatVersion) -> PointsResult<ProtocolVersion> {
    VERSION_TABLE
        .iter()
        .find(|(format, _)| *format == version)
        .map(|&(_, protocol)| protocol)
        .ok_or(PointsError::UnsupportedVersion {
            version: version.get(),
        })
}

/// The newest table entry.
#[must_use]
pub fn current() -> (FormatVersion, ProtocolVersion) {
    VERSION_TABLE
        .last()
        .copied()
        .unwrap_or((VERSION_START, VERSION_META_FILE))
}

/// The full table, oldest first.
#[must_use]
pub fn entries() -> &'static [(FormatVersion, ProtocolVersion)] {
    VERSION_TABLE
}

/// Returns true if `version` has a table entry.
#[must_use]
pub fn is_supported(version: FormatVersion) -> bool {
    resolve(version).is_ok()
}
