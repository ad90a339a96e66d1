//! Little-endian data decoder.

use crate::error::{CodecError, CodecResult};
use bytes::Buf;

/// A bounds-checked cursor over encoded bytes.
///
/// Every read either succeeds or returns [`CodecError::UnexpectedEof`];
/// the decoder never panics on short input.
#[derive(Debug, Clone)]
pub struct DataReader<'a> {
    buf: &'a [u8],
    total: usize,
}

impl<'a> DataReader<'a> {
    /// Create a reader over the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            buf: data,
            total: data.len(),
        }
    }

    /// Current offset from the start of the input.
    pub fn position(&self) -> usize {
        self.total - self.buf.remaining()
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Returns true if all input has been consumed.
    pub fn is_exhausted(&self) -> bool {
        !self.buf.has_remaining()
    }

    fn ensure(&self, needed: usize) -> CodecResult<()> {
        if self.buf.remaining() < needed {
            return Err(CodecError::UnexpectedEof {
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> CodecResult<u8> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    /// Read a little-endian `u16`.
    pub fn read_u16(&mut self) -> CodecResult<u16> {
        self.ensure(2)?;
        Ok(self.buf.get_u16_le())
    }

    /// Read a little-endian `u32`.
    pub fn read_u32(&mut self) -> CodecResult<u32> {
        self.ensure(4)?;
        Ok(self.buf.get_u32_le())
    }

    /// Read a little-endian `i32`.
    pub fn read_i32(&mut self) -> CodecResult<i32> {
        self.ensure(4)?;
        Ok(self.buf.get_i32_le())
    }

    /// Read a little-endian `u64`.
    pub fn read_u64(&mut self) -> CodecResult<u64> {
        self.ensure(8)?;
        Ok(self.buf.get_u64_le())
    }

    /// Read a big-endian `u32`.
    pub fn read_u32_be(&mut self) -> CodecResult<u32> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    /// Read a big-endian `u64`.
    pub fn read_u64_be(&mut self) -> CodecResult<u64> {
        self.ensure(8)?;
        Ok(self.buf.get_u64())
    }

    /// Read a variable-length `u32`.
    pub fn read_vint(&mut self) -> CodecResult<u32> {
        let value = self.read_vlong()?;
        u32::try_from(value).map_err(|_| CodecError::MalformedVarInt)
    }

    /// Read a variable-length `u64`.
    pub fn read_vlong(&mut self) -> CodecResult<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            if shift == 63 && byte > 1 {
                return Err(CodecError::MalformedVarInt);
            }
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift > 63 {
                return Err(CodecError::MalformedVarInt);
            }
        }
    }

    /// Borrow the next `len` bytes.
    pub fn read_slice(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        self.ensure(len)?;
        let buf: &'a [u8] = self.buf;
        let (head, tail) = buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    /// Copy the next `len` bytes into `dst`.
    pub fn read_into(&mut self, dst: &mut [u8]) -> CodecResult<()> {
        self.ensure(dst.len())?;
        self.buf.copy_to_slice(dst);
        Ok(())
    }

    /// Read bytes prefixed by their variable-length size.
    pub fn read_len_bytes(&mut self) -> CodecResult<&'a [u8]> {
        let len = self.read_vlong()?;
        let len = usize::try_from(len).map_err(|_| CodecError::MalformedVarInt)?;
        self.read_slice(len)
    }

    /// Read a UTF-8 string prefixed by its variable-length size.
    pub fn read_string(&mut self) -> CodecResult<String> {
        let bytes = self.read_len_bytes()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8)
    }

    /// Skip `len` bytes.
    pub fn skip(&mut self, len: usize) -> CodecResult<()> {
        self.ensure(len)?;
        self.buf.advance(len);
        Ok(())
    }
}
