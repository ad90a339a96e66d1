//! Little-endian data encoder.

use bytes::{BufMut, BytesMut};

/// An append-only byte encoder.
///
/// Fixed-width integers are little-endian. Variable-length integers use
/// 7 bits per byte with the high bit as a continuation flag.
#[derive(Debug, Default, Clone)]
pub struct DataWriter {
    buffer: BytesMut,
}

impl DataWriter {
    /// Create a new writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new writer with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, value: u8) {
        self.buffer.put_u8(value);
    }

    /// Write a little-endian `u16`.
    pub fn write_u16(&mut self, value: u16) {
        self.buffer.put_u16_le(value);
    }

    /// Write a little-endian `u32`.
    pub fn write_u32(&mut self, value: u32) {
        self.buffer.put_u32_le(value);
    }

    /// Write a little-endian `i32`.
    pub fn write_i32(&mut self, value: i32) {
        self.buffer.put_i32_le(value);
    }

    /// Write a little-endian `u64`.
    pub fn write_u64(&mut self, value: u64) {
        self.buffer.put_u64_le(value);
    }

    /// Write a big-endian `u32` (header and footer fields).
    pub fn write_u32_be(&mut self, value: u32) {
        self.buffer.put_u32(value);
    }

    /// Write a big-endian `u64` (footer checksum).
    pub fn write_u64_be(&mut self, value: u64) {
        self.buffer.put_u64(value);
    }

    /// Write a variable-length `u32`.
    pub fn write_vint(&mut self, value: u32) {
        self.write_vlong(u64::from(value));
    }

    /// Write a variable-length `u64`.
    pub fn write_vlong(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buffer.put_u8((value as u8 & 0x7F) | 0x80);
            value >>= 7;
        }
        self.buffer.put_u8(value as u8);
    }

    /// Write raw bytes with no length prefix.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.put_slice(bytes);
    }

    /// Write bytes prefixed by their variable-length size.
    pub fn write_len_bytes(&mut self, bytes: &[u8]) {
        self.write_vlong(bytes.len() as u64);
        self.buffer.put_slice(bytes);
    }

    /// Write a UTF-8 string prefixed by its variable-length size.
    pub fn write_string(&mut self, value: &str) {
        self.write_len_bytes(value.as_bytes());
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Discard everything written so far, keeping the allocation.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Get a reference to the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume this writer and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.to_vec()
    }
}
