//! Byte Buffer Primitives
//!
//! Little-endian, fixed-width accessors over a message buffer, addressed by
//! absolute byte offset. Every access is bounds checked and a failed access
//! surfaces as a codec error for that message, never as a silent truncation.

use thiserror::Error;

/// Errors raised by buffer access during decode or encode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Read past the end of the message buffer.
    #[error("read out of bounds: {len} bytes at offset {offset}, buffer holds {size}")]
    ReadOutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },

    /// Write past the end of the output buffer.
    #[error("write out of bounds: {len} bytes at offset {offset}, buffer holds {size}")]
    WriteOutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Read-only view of a complete message buffer.
pub struct ByteReader<'a> {
    buf: &'a [u8],
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn slice(&self, offset: usize, len: usize) -> CodecResult<&'a [u8]> {
        match offset
            .checked_add(len)
            .and_then(|end| self.buf.get(offset..end))
        {
            Some(s) => Ok(s),
            None => Err(CodecError::ReadOutOfBounds {
                offset,
                len,
                size: self.buf.len(),
            }),
        }
    }

    fn array<const N: usize>(&self, offset: usize) -> CodecResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.slice(offset, N)?);
        Ok(out)
    }

    pub fn get_u8(&self, offset: usize) -> CodecResult<u8> {
        Ok(self.slice(offset, 1)?[0])
    }

    pub fn get_u16(&self, offset: usize) -> CodecResult<u16> {
        Ok(u16::from_le_bytes(self.array(offset)?))
    }

    pub fn get_u32(&self, offset: usize) -> CodecResult<u32> {
        Ok(u32::from_le_bytes(self.array(offset)?))
    }

    pub fn get_u64(&self, offset: usize) -> CodecResult<u64> {
        Ok(u64::from_le_bytes(self.array(offset)?))
    }

    pub fn get_i16(&self, offset: usize) -> CodecResult<i16> {
        Ok(i16::from_le_bytes(self.array(offset)?))
    }

    pub fn get_i32(&self, offset: usize) -> CodecResult<i32> {
        Ok(i32::from_le_bytes(self.array(offset)?))
    }

    pub fn get_i64(&self, offset: usize) -> CodecResult<i64> {
        Ok(i64::from_le_bytes(self.array(offset)?))
    }

    pub fn get_f32(&self, offset: usize) -> CodecResult<f32> {
        Ok(f32::from_le_bytes(self.array(offset)?))
    }

    pub fn get_f64(&self, offset: usize) -> CodecResult<f64> {
        Ok(f64::from_le_bytes(self.array(offset)?))
    }

    /// Raw byte run of exactly `len` bytes.
    pub fn get_bytes(&self, offset: usize, len: usize) -> CodecResult<&'a [u8]> {
        self.slice(offset, len)
    }
}

/// Writable view of an output buffer.
pub struct ByteWriter<'a> {
    buf: &'a mut [u8],
}

impl<'a> ByteWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn span(&mut self, offset: usize, len: usize) -> CodecResult<&mut [u8]> {
        let size = self.buf.len();
        match offset
            .checked_add(len)
            .and_then(|end| self.buf.get_mut(offset..end))
        {
            Some(s) => Ok(s),
            None => Err(CodecError::WriteOutOfBounds { offset, len, size }),
        }
    }

    pub fn set_u8(&mut self, offset: usize, value: u8) -> CodecResult<()> {
        self.span(offset, 1)?[0] = value;
        Ok(())
    }

    pub fn set_u16(&mut self, offset: usize, value: u16) -> CodecResult<()> {
        self.span(offset, 2)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn set_u32(&mut self, offset: usize, value: u32) -> CodecResult<()> {
        self.span(offset, 4)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn set_u64(&mut self, offset: usize, value: u64) -> CodecResult<()> {
        self.span(offset, 8)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn set_i16(&mut self, offset: usize, value: i16) -> CodecResult<()> {
        self.span(offset, 2)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn set_i32(&mut self, offset: usize, value: i32) -> CodecResult<()> {
        self.span(offset, 4)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn set_i64(&mut self, offset: usize, value: i64) -> CodecResult<()> {
        self.span(offset, 8)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn set_f32(&mut self, offset: usize, value: f32) -> CodecResult<()> {
        self.span(offset, 4)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn set_f64(&mut self, offset: usize, value: f64) -> CodecResult<()> {
        self.span(offset, 8)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn set_bytes(&mut self, offset: usize, data: &[u8]) -> CodecResult<()> {
        self.span(offset, data.len())?.copy_from_slice(data);
        Ok(())
    }
}
