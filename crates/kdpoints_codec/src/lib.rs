//! # kdpoints codec
//!
//! Byte-level building blocks shared by every kdpoints file.
//!
//! This crate provides:
//! - [`DataWriter`] / [`DataReader`] for little-endian fixed-width and
//!   variable-length integers, raw and length-prefixed bytes
//! - Index headers that pin a file to a codec name, version and segment
//! - Checksummed outputs and CRC32 footers that mark a file as sealed
//!
//! ## File framing
//!
//! ```text
//! +-------------+---------------------------+--------+
//! | IndexHeader | body (codec specific)     | Footer |
//! +-------------+---------------------------+--------+
//! ```
//!
//! ## Usage
//!
//! ```
//! use kdpoints_codec::{check_index_header, write_index_header, DataReader, DataWriter};
//!
//! let id = [1u8; 16];
//! let mut w = DataWriter::new();
//! write_index_header(&mut w, "Example", 2, &id, "").unwrap();
//! w.write_vint(42);
//!
//! let bytes = w.into_bytes();
//! let mut r = DataReader::new(&bytes);
//! assert_eq!(check_index_header(&mut r, "Example", 0, 2, &id, "").unwrap(), 2);
//! assert_eq!(r.read_vint().unwrap(), 42);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod checksum;
mod decoder;
mod encoder;
mod error;
mod header;

pub use checksum::{
    checksum_entire_file, retrieve_checksum, verify_checksum, ChecksumOutput,
    CHECKSUM_ALGORITHM_CRC32, FOOTER_LENGTH, FOOTER_MAGIC,
};
pub use decoder::DataReader;
pub use encoder::DataWriter;
pub use error::{CodecError, CodecResult};
pub use header::{
    check_index_header, index_header_length, read_index_header, segment_file_name,
    to_hex, write_index_header, IndexHeader, SegmentId, CODEC_MAGIC, ID_LENGTH,
};
