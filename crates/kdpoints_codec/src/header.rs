//! Index headers shared by every kdpoints file.
//!
//! ## Layout
//!
//! ```text
//! IndexHeader {
//!     magic: u32 (big-endian)   // 0x3fd76c17
//!     codec: vint len + UTF-8   // at most 127 bytes
//!     version: u32 (big-endian)
//!     segment_id: [u8; 16]
//!     suffix: u8 len + UTF-8    // at most 255 bytes
//! }
//! ```
//!
//! The header pins a file to one codec, one version, and one segment.
//! Readers check every field before trusting anything that follows.

use crate::decoder::DataReader;
use crate::encoder::DataWriter;
use crate::error::{CodecError, CodecResult};

/// Magic number at the start of every file.
pub const CODEC_MAGIC: u32 = 0x3fd7_6c17;

/// Length of a segment id.
pub const ID_LENGTH: usize = 16;

/// Unique identifier of the segment a file belongs to.
pub type SegmentId = [u8; ID_LENGTH];

/// A decoded index header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHeader {
    /// Codec name.
    pub codec: String,
    /// Codec version.
    pub version: u32,
    /// Owning segment.
    pub segment_id: SegmentId,
    /// Segment suffix.
    pub suffix: String,
}

/// Writes an index header.
///
/// # Errors
///
/// Returns an error if the codec name is not ASCII or longer than 127
/// bytes, or the suffix is longer than 255 bytes.
pub fn write_index_header(
    w: &mut DataWriter,
    codec: &str,
    version: u32,
    segment_id: &SegmentId,
    suffix: &str,
) -> CodecResult<()> {
    if !codec.is_ascii() || codec.len() > 127 {
        return Err(CodecError::invalid_structure(format!(
            "codec name must be ASCII and at most 127 bytes: {codec:?}"
        )));
    }
    let suffix_len = u8::try_from(suffix.len()).map_err(|_| {
        CodecError::invalid_structure(format!("segment suffix too long: {} bytes", suffix.len()))
    })?;

    w.write_u32_be(CODEC_MAGIC);
    w.write_string(codec);
    w.write_u32_be(version);
    w.write_bytes(segment_id);
    w.write_u8(suffix_len);
    w.write_bytes(suffix.as_bytes());
    Ok(())
}

/// Returns the encoded length of an index header.
#[must_use]
pub fn index_header_length(codec: &str, suffix: &str) -> usize {
    4 + 1 + codec.len() + 4 + ID_LENGTH + 1 + suffix.len()
}

/// Reads an index header without checking it against expectations.
///
/// # Errors
///
/// Returns an error on bad magic or truncated input.
pub fn read_index_header(r: &mut DataReader<'_>) -> CodecResult<IndexHeader> {
    let magic = r.read_u32_be()?;
    if magic != CODEC_MAGIC {
        return Err(CodecError::BadMagic {
            expected: CODEC_MAGIC,
            actual: magic,
        });
    }
    let codec = r.read_string()?;
    let version = r.read_u32_be()?;
    let mut segment_id = [0u8; ID_LENGTH];
    r.read_into(&mut segment_id)?;
    let suffix_len = usize::from(r.read_u8()?);
    let suffix = std::str::from_utf8(r.read_slice(suffix_len)?)
        .map_err(|_| CodecError::InvalidUtf8)?
        .to_string();

    Ok(IndexHeader {
        codec,
        version,
        segment_id,
        suffix,
    })
}

/// Reads an index header and validates every field.
///
/// Returns the recorded version, which is guaranteed to lie within
/// `min_version..=max_version`.
///
/// # Errors
///
/// Returns the first mismatch found, checked in the order magic, codec,
/// version, segment id, suffix.
pub fn check_index_header(
    r: &mut DataReader<'_>,
    codec: &str,
    min_version: u32,
    max_version: u32,
    segment_id: &SegmentId,
    suffix: &str,
) -> CodecResult<u32> {
    let header = read_index_header(r)?;
    if header.codec != codec {
        return Err(CodecError::CodecMismatch {
            expected: codec.to_string(),
            actual: header.codec,
        });
    }
    if header.version < min_version || header.version > max_version {
        return Err(CodecError::VersionOutOfRange {
            version: header.version,
            min: min_version,
            max: max_version,
        });
    }
    if &header.segment_id != segment_id {
        return Err(CodecError::SegmentIdMismatch {
            expected: to_hex(segment_id),
            actual: to_hex(&header.segment_id),
        });
    }
    if header.suffix != suffix {
        return Err(CodecError::SuffixMismatch {
            expected: suffix.to_string(),
            actual: header.suffix,
        });
    }
    Ok(header.version)
}

/// Formats bytes (a segment id, a packed value) as lowercase hex.
#[must_use]
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Builds a segment file name: `<segment>[_<suffix>][.<ext>]`.
#[must_use]
pub fn segment_file_name(segment: &str, suffix: &str, ext: &str) -> String {
    let mut name = String::with_capacity(segment.len() + suffix.len() + ext.len() + 2);
    name.push_str(segment);
    if !suffix.is_empty() {
        name.push('_');
        name.push_str(suffix);
    }
    if !ext.is_empty() {
        name.push('.');
        name.push_str(ext);
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: SegmentId = [7u8; ID_LENGTH];

    fn header_bytes(codec: &str, version: u32, suffix: &str) -> Vec<u8> {
        let mut w = DataWriter::new();
        write_index_header(&mut w, codec, version, &ID, suffix).unwrap();
        w.into_bytes()
    }

    #[test]
    fn header_length_matches_encoding() {
        let bytes = header_bytes("PointsMeta", 1, "x1");
        assert_eq!(bytes.len(), index_header_length("PointsMeta", "x1"));
        assert_eq!(&bytes[..4], &[0x3f, 0xd7, 0x6c, 0x17]);
    }

    #[test]
    fn check_accepts_matching_header() {
        let bytes = header_bytes("PointsMeta", 1, "");
        let mut r = DataReader::new(&bytes);
        let version = check_index_header(&mut r, "PointsMeta", 0, 1, &ID, "").unwrap();
        assert_eq!(version, 1);
        assert!(r.is_exhausted());
    }

    #[test]
    fn check_rejects_each_mismatch() {
        let bytes = header_bytes("PointsMeta", 3, "s");

        let err = check_index_header(&mut DataReader::new(&bytes), "PointsData", 0, 3, &ID, "s");
        assert!(matches!(err, Err(CodecError::CodecMismatch { .. })));

        let err = check_index_header(&mut DataReader::new(&bytes), "PointsMeta", 0, 2, &ID, "s");
        assert!(matches!(
            err,
            Err(CodecError::VersionOutOfRange {
                version: 3,
                min: 0,
                max: 2
            })
        ));

        let err =
            check_index_header(&mut DataReader::new(&bytes), "PointsMeta", 0, 3, &[0; 16], "s");
        assert!(matches!(err, Err(CodecError::SegmentIdMismatch { .. })));

        let err = check_index_header(&mut DataReader::new(&bytes), "PointsMeta", 0, 3, &ID, "t");
        assert!(matches!(err, Err(CodecError::SuffixMismatch { .. })));
    }

    #[test]
    fn bad_magic() {
        let mut bytes = header_bytes("PointsMeta", 0, "");
        bytes[0] ^= 0xFF;
        let err = read_index_header(&mut DataReader::new(&bytes));
        assert!(matches!(err, Err(CodecError::BadMagic { .. })));
    }

    #[test]
    fn rejects_unencodable_names() {
        let mut w = DataWriter::new();
        assert!(write_index_header(&mut w, &"c".repeat(128), 0, &ID, "").is_err());
        assert!(write_index_header(&mut w, "c", 0, &ID, &"s".repeat(256)).is_err());
    }

    #[test]
    fn file_names() {
        assert_eq!(segment_file_name("_0", "", "kdm"), "_0.kdm");
        assert_eq!(segment_file_name("_0", "geo", "kdd"), "_0_geo.kdd");
        assert_eq!(segment_file_name("_0", "", ""), "_0");
    }

    #[test]
    fn hex_id() {
        let mut id = [0u8; 16];
        id[0] = 0xab;
        id[15] = 0x01;
        assert_eq!(to_hex(&id), "ab000000000000000000000000000001");
        assert_eq!(to_hex(&[0x00, 0x7f, 0xff]), "007fff");
        assert_eq!(to_hex(&[]), "");
    }
}
