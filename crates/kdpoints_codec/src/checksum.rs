//! Checksummed outputs and footer verification.
//!
//! ## Footer layout
//!
//! ```text
//! Footer {
//!     magic: u32 (big-endian)      // !CODEC_MAGIC
//!     algorithm: u32 (big-endian)  // 0 = CRC32
//!     checksum: u64 (big-endian)   // CRC32 of every preceding byte
//! }
//! ```
//!
//! The checksum covers the footer magic and algorithm id as well as the
//! file body. A file without a valid footer was never sealed.

use crate::decoder::DataReader;
use crate::encoder::DataWriter;
use crate::error::{CodecError, CodecResult};
use crate::header::CODEC_MAGIC;
use crc32fast::Hasher;
use kdpoints_storage::{IndexInput, IndexOutput, StorageResult};

/// Magic number at the start of every footer.
pub const FOOTER_MAGIC: u32 = !CODEC_MAGIC;

/// Length of the footer in bytes.
pub const FOOTER_LENGTH: usize = 16;

/// Identifier of the CRC32 checksum algorithm.
pub const CHECKSUM_ALGORITHM_CRC32: u32 = 0;

const VERIFY_CHUNK: usize = 64 * 1024;

/// An output that checksums every byte written through it.
pub struct ChecksumOutput {
    out: Box<dyn IndexOutput>,
    hasher: Hasher,
}

impl std::fmt::Debug for ChecksumOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChecksumOutput")
            .field("name", &self.out.name())
            .field("position", &self.out.position())
            .finish()
    }
}

impl ChecksumOutput {
    /// Wraps an output.
    pub fn new(out: Box<dyn IndexOutput>) -> Self {
        Self {
            out,
            hasher: Hasher::new(),
        }
    }

    /// Returns the name of the underlying file.
    pub fn name(&self) -> &str {
        self.out.name()
    }

    /// Writes raw bytes, returning the offset they were written at.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying write fails.
    pub fn write_bytes(&mut self, data: &[u8]) -> StorageResult<u64> {
        let offset = self.out.write_bytes(data)?;
        self.hasher.update(data);
        Ok(offset)
    }

    /// Writes the contents of an encoder, returning the start offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying write fails.
    pub fn write_data(&mut self, data: &DataWriter) -> StorageResult<u64> {
        self.write_bytes(data.as_bytes())
    }

    /// Number of bytes written so far.
    pub fn position(&self) -> u64 {
        self.out.position()
    }

    /// Checksum of the bytes written so far.
    pub fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    /// Writes the footer, syncs, and returns the final checksum.
    ///
    /// # Errors
    ///
    /// Returns an error if the footer cannot be written or synced.
    pub fn finish(mut self) -> CodecResult<u32> {
        let mut footer = DataWriter::with_capacity(FOOTER_LENGTH);
        footer.write_u32_be(FOOTER_MAGIC);
        footer.write_u32_be(CHECKSUM_ALGORITHM_CRC32);
        self.write_bytes(footer.as_bytes())?;

        let checksum = self.checksum();
        footer.clear();
        footer.write_u64_be(u64::from(checksum));
        self.out.write_bytes(footer.as_bytes())?;

        self.out.flush()?;
        self.out.sync()?;
        Ok(checksum)
    }
}

/// Validates the structure of a footer and returns the stored checksum.
fn parse_footer(footer: &[u8]) -> CodecResult<u32> {
    let mut r = DataReader::new(footer);
    let magic = r.read_u32_be()?;
    if magic != FOOTER_MAGIC {
        return Err(CodecError::invalid_footer(format!(
            "footer magic mismatch: expected {FOOTER_MAGIC:08x}, got {magic:08x}"
        )));
    }
    let algorithm = r.read_u32_be()?;
    if algorithm != CHECKSUM_ALGORITHM_CRC32 {
        return Err(CodecError::invalid_footer(format!(
            "unknown checksum algorithm: {algorithm}"
        )));
    }
    let stored = r.read_u64_be()?;
    u32::try_from(stored)
        .map_err(|_| CodecError::invalid_footer(format!("illegal checksum: {stored:016x}")))
}

fn split_footer(data: &[u8]) -> CodecResult<(&[u8], &[u8])> {
    if data.len() < FOOTER_LENGTH {
        return Err(CodecError::invalid_footer(format!(
            "file too short for footer: {} bytes",
            data.len()
        )));
    }
    Ok(data.split_at(data.len() - FOOTER_LENGTH))
}

/// Verifies the checksum of a fully loaded file and returns its body
/// (everything before the footer).
///
/// # Errors
///
/// Returns an error if the footer is malformed or the checksum differs.
pub fn verify_checksum(data: &[u8]) -> CodecResult<&[u8]> {
    let (body, footer) = split_footer(data)?;
    let expected = parse_footer(footer)?;

    let mut hasher = Hasher::new();
    hasher.update(body);
    hasher.update(&footer[..8]);
    let actual = hasher.finalize();
    if expected != actual {
        return Err(CodecError::ChecksumMismatch { expected, actual });
    }
    Ok(body)
}

/// Reads the stored checksum of a file after validating footer structure.
///
/// This does not checksum the body; it is the cheap check done when a
/// file is opened.
///
/// # Errors
///
/// Returns an error if the file is too short or the footer is malformed.
pub fn retrieve_checksum(input: &dyn IndexInput) -> CodecResult<u32> {
    let len = input.len();
    if len < FOOTER_LENGTH as u64 {
        return Err(CodecError::invalid_footer(format!(
            "{} too short for footer: {len} bytes",
            input.name()
        )));
    }
    let footer = input.read_at(len - FOOTER_LENGTH as u64, FOOTER_LENGTH)?;
    parse_footer(&footer)
}

/// Checksums an entire file in chunks and compares it with the footer.
///
/// # Errors
///
/// Returns an error if the footer is malformed or the checksum differs.
pub fn checksum_entire_file(input: &dyn IndexInput) -> CodecResult<u32> {
    let expected = retrieve_checksum(input)?;
    let covered = input.len() - 8;

    let mut hasher = Hasher::new();
    let mut offset = 0u64;
    while offset < covered {
        let chunk = usize::try_from(covered - offset)
            .unwrap_or(VERIFY_CHUNK)
            .min(VERIFY_CHUNK);
        hasher.update(&input.read_at(offset, chunk)?);
        offset += chunk as u64;
    }

    let actual = hasher.finalize();
    if expected != actual {
        return Err(CodecError::ChecksumMismatch { expected, actual });
    }
    Ok(actual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kdpoints_storage::{Directory, MemoryDirectory};

    fn sealed_file(dir: &MemoryDirectory, name: &str, body: &[u8]) -> u32 {
        let mut out = ChecksumOutput::new(dir.create_output(name).unwrap());
        out.write_bytes(body).unwrap();
        out.finish().unwrap()
    }

    #[test]
    fn sealed_file_verifies() {
        let dir = MemoryDirectory::new();
        let checksum = sealed_file(&dir, "f", b"leaf blocks");

        let bytes = dir.file_bytes("f").unwrap();
        assert_eq!(bytes.len(), 11 + FOOTER_LENGTH);
        assert_eq!(verify_checksum(&bytes).unwrap(), b"leaf blocks");

        let input = dir.open_input("f").unwrap();
        assert_eq!(retrieve_checksum(input.as_ref()).unwrap(), checksum);
        assert_eq!(checksum_entire_file(input.as_ref()).unwrap(), checksum);
    }

    #[test]
    fn flipped_body_byte_is_detected() {
        let dir = MemoryDirectory::new();
        sealed_file(&dir, "f", b"inner nodes");

        let mut bytes = dir.file_bytes("f").unwrap();
        bytes[3] ^= 0x01;
        assert!(matches!(
            verify_checksum(&bytes),
            Err(CodecError::ChecksumMismatch { .. })
        ));

        dir.replace_file("f", bytes);
        let input = dir.open_input("f").unwrap();
        // Structure is still intact, only the full pass notices.
        assert!(retrieve_checksum(input.as_ref()).is_ok());
        assert!(matches!(
            checksum_entire_file(input.as_ref()),
            Err(CodecError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn missing_footer_is_detected() {
        let dir = MemoryDirectory::new();
        let mut out = dir.create_output("unsealed").unwrap();
        out.write_bytes(&[0u8; 32]).unwrap();
        drop(out);

        let input = dir.open_input("unsealed").unwrap();
        assert!(matches!(
            retrieve_checksum(input.as_ref()),
            Err(CodecError::InvalidFooter { .. })
        ));
        assert!(matches!(
            verify_checksum(&[0u8; 4]),
            Err(CodecError::InvalidFooter { .. })
        ));
    }

    #[test]
    fn checksum_spans_chunks() {
        let dir = MemoryDirectory::new();
        let body: Vec<u8> = (0..(VERIFY_CHUNK * 2 + 17)).map(|i| i as u8).collect();
        let checksum = sealed_file(&dir, "big", &body);

        let input = dir.open_input("big").unwrap();
        assert_eq!(checksum_entire_file(input.as_ref()).unwrap(), checksum);
    }
}
