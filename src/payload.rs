//! Typed, bounds-checked access to payload bytes
//!
//! [`PayloadBuilder`] writes into a caller-owned fixed buffer and
//! [`PayloadReader`] reads back out of a borrowed slice, so neither side
//! allocates. Multi-byte values are big-endian regardless of host byte
//! order. Every operation either completes fully or fails leaving the
//! position untouched.

use crate::error::{ProtocolError, Result};

/// Longest string the one-byte length prefix can describe
pub const MAX_STRING_LEN: usize = u8::MAX as usize;

/// Writes typed values into a fixed-capacity buffer
///
/// ```
/// use serial_frame_protocol::PayloadBuilder;
///
/// let mut buf = [0u8; 8];
/// let mut builder = PayloadBuilder::new(&mut buf);
/// builder.put_u16(500)?;
/// builder.put_str("ok")?;
/// assert_eq!(builder.as_slice(), &[0x01, 0xF4, 0x02, b'o', b'k']);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct PayloadBuilder<'a> {
    buffer: &'a mut [u8],
    position: usize,
}

impl<'a> PayloadBuilder<'a> {
    /// Wrap `buffer`; its length is the capacity
    pub fn new(buffer: &'a mut [u8]) -> Self {
        PayloadBuilder {
            buffer,
            position: 0,
        }
    }

    /// Discard everything written so far
    pub fn reset(&mut self) {
        self.position = 0;
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.position
    }

    /// True when nothing has been written
    pub fn is_empty(&self) -> bool {
        self.position == 0
    }

    /// Total capacity
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Capacity still available
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    /// The bytes written so far
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..self.position]
    }

    fn reserve(&self, needed: usize) -> Result<()> {
        if needed > self.remaining() {
            return Err(ProtocolError::buffer_full(needed, self.remaining()));
        }
        Ok(())
    }

    fn put_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve(bytes.len())?;
        let end = self.position + bytes.len();
        self.buffer[self.position..end].copy_from_slice(bytes);
        self.position = end;
        Ok(())
    }

    /// Write one unsigned byte
    pub fn put_u8(&mut self, value: u8) -> Result<()> {
        self.put_raw(&[value])
    }

    /// Write a big-endian `i16`
    pub fn put_i16(&mut self, value: i16) -> Result<()> {
        self.put_raw(&value.to_be_bytes())
    }

    /// Write a big-endian `u16`
    pub fn put_u16(&mut self, value: u16) -> Result<()> {
        self.put_raw(&value.to_be_bytes())
    }

    /// Write a big-endian `i32`
    pub fn put_i32(&mut self, value: i32) -> Result<()> {
        self.put_raw(&value.to_be_bytes())
    }

    /// Write a big-endian `u32`
    pub fn put_u32(&mut self, value: u32) -> Result<()> {
        self.put_raw(&value.to_be_bytes())
    }

    /// Write an `f32` as its IEEE-754 bit pattern, big-endian
    pub fn put_f32(&mut self, value: f32) -> Result<()> {
        self.put_u32(value.to_bits())
    }

    /// Write a length-prefixed UTF-8 string (no terminator)
    pub fn put_str(&mut self, value: &str) -> Result<()> {
        self.put_prefixed(value.as_bytes())
    }

    /// Write a length-prefixed byte string (prefix max 255)
    pub fn put_prefixed(&mut self, value: &[u8]) -> Result<()> {
        if value.len() > MAX_STRING_LEN {
            return Err(ProtocolError::StringTooLong(value.len()));
        }
        self.reserve(1 + value.len())?;
        self.buffer[self.position] = value.len() as u8;
        self.position += 1;
        self.put_raw(value)
    }

    /// Write raw bytes with no prefix
    pub fn put_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.put_raw(value)
    }
}

/// Reads typed values out of a payload
#[derive(Debug, Clone)]
pub struct PayloadReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> PayloadReader<'a> {
    /// Start reading at the beginning of `buffer`
    pub fn new(buffer: &'a [u8]) -> Self {
        PayloadReader {
            buffer,
            position: 0,
        }
    }

    /// Rewind to the start
    pub fn reset(&mut self) {
        self.position = 0;
    }

    /// Current read offset
    pub fn position(&self) -> usize {
        self.position
    }

    /// Unread bytes
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    /// True while unread bytes remain
    pub fn has_data(&self) -> bool {
        self.position < self.buffer.len()
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        if count > self.remaining() {
            return Err(ProtocolError::insufficient_data(count, self.remaining()));
        }
        let buffer: &'a [u8] = self.buffer;
        let bytes = &buffer[self.position..self.position + count];
        self.position += count;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Read one unsigned byte
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    /// Read a big-endian `i16`
    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.take_array()?))
    }

    /// Read a big-endian `u16`
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    /// Read a big-endian `i32`
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    /// Read a big-endian `u32`
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    /// Read an IEEE-754 `f32` bit pattern
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Read a length-prefixed byte string without copying
    ///
    /// Fails without consuming the prefix if the declared length runs past
    /// the end of the payload.
    pub fn read_prefixed(&mut self) -> Result<&'a [u8]> {
        let Some(&len) = self.buffer.get(self.position) else {
            return Err(ProtocolError::insufficient_data(1, 0));
        };
        let needed = 1 + len as usize;
        if needed > self.remaining() {
            return Err(ProtocolError::insufficient_data(needed, self.remaining()));
        }
        self.position += 1;
        self.take(len as usize)
    }

    /// Read a length-prefixed UTF-8 string without copying
    pub fn read_str(&mut self) -> Result<&'a str> {
        let start = self.position;
        let bytes = self.read_prefixed()?;
        match std::str::from_utf8(bytes) {
            Ok(text) => Ok(text),
            Err(_) => {
                self.position = start;
                Err(ProtocolError::InvalidUtf8)
            }
        }
    }

    /// Copy a length-prefixed string into `out`, returning its length
    ///
    /// Fails if the string is longer than `out` or than the unread payload;
    /// the position is unchanged on either failure.
    pub fn read_str_into(&mut self, out: &mut [u8]) -> Result<usize> {
        let start = self.position;
        let bytes = self.read_prefixed()?;
        if bytes.len() > out.len() {
            self.position = start;
            return Err(ProtocolError::OutputTooSmall {
                needed: bytes.len(),
                capacity: out.len(),
            });
        }
        out[..bytes.len()].copy_from_slice(bytes);
        Ok(bytes.len())
    }

    /// Read exactly `len` raw bytes without copying
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    /// Everything not yet read
    pub fn rest(&mut self) -> &'a [u8] {
        let buffer: &'a [u8] = self.buffer;
        let rest = &buffer[self.position..];
        self.position = buffer.len();
        rest
    }
}
