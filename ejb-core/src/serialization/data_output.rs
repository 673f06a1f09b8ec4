//! Primitive output for the envelope wire format.

use crate::error::{EjbError, Result};
use bytes::{BufMut, BytesMut};

/// Trait for writing primitive values in the envelope wire format.
///
/// All multi-byte values are written in big-endian byte order.
pub trait DataOutput {
    /// Writes a single signed byte.
    fn write_byte(&mut self, v: i8) -> Result<()>;

    /// Writes a single unsigned byte, used for discriminants and codes.
    fn write_u8(&mut self, v: u8) -> Result<()>;

    /// Writes a boolean as a single byte (0 for false, 1 for true).
    fn write_bool(&mut self, v: bool) -> Result<()>;

    /// Writes a 16-bit signed integer.
    fn write_short(&mut self, v: i16) -> Result<()>;

    /// Writes a 16-bit UTF-16 code unit.
    fn write_char(&mut self, v: u16) -> Result<()>;

    /// Writes a 32-bit signed integer.
    fn write_int(&mut self, v: i32) -> Result<()>;

    /// Writes a 64-bit signed integer.
    fn write_long(&mut self, v: i64) -> Result<()>;

    /// Writes a 32-bit floating point value.
    fn write_float(&mut self, v: f32) -> Result<()>;

    /// Writes a 64-bit floating point value.
    fn write_double(&mut self, v: f64) -> Result<()>;

    /// Writes raw bytes without length prefix.
    fn write_bytes(&mut self, v: &[u8]) -> Result<()>;

    /// Writes a string with an `i32` length prefix.
    fn write_string(&mut self, v: &str) -> Result<()>;

    /// Writes a short string with a `u16` length prefix.
    ///
    /// Used for names the receiver dispatches on: method names, class names,
    /// deployment ids, naming paths.
    fn write_utf(&mut self, v: &str) -> Result<()> {
        let bytes = v.as_bytes();
        let len = u16::try_from(bytes.len()).map_err(|_| {
            EjbError::Serialization(format!(
                "UTF string too long: {} bytes (max {})",
                bytes.len(),
                u16::MAX
            ))
        })?;
        self.write_char(len)?;
        self.write_bytes(bytes)
    }

    /// Writes a presence flag followed by the string, if any.
    fn write_nullable_utf(&mut self, v: Option<&str>) -> Result<()> {
        match v {
            Some(s) => {
                self.write_bool(true)?;
                self.write_utf(s)
            }
            None => self.write_bool(false),
        }
    }
}

/// A growable buffer implementing [`DataOutput`].
#[derive(Debug)]
pub struct BufferOutput {
    buffer: BytesMut,
}

impl BufferOutput {
    /// Creates a new output with default capacity.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(256),
        }
    }

    /// Creates a new output with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Returns the written bytes as a slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the output and returns the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    /// Consumes the output and returns the underlying buffer.
    pub fn into_inner(self) -> BytesMut {
        self.buffer
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for BufferOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl DataOutput for BufferOutput {
    fn write_byte(&mut self, v: i8) -> Result<()> {
        self.buffer.put_i8(v);
        Ok(())
    }

    fn write_u8(&mut self, v: u8) -> Result<()> {
        self.buffer.put_u8(v);
        Ok(())
    }

    fn write_bool(&mut self, v: bool) -> Result<()> {
        self.buffer.put_u8(if v { 1 } else { 0 });
        Ok(())
    }

    fn write_short(&mut self, v: i16) -> Result<()> {
        self.buffer.put_i16(v);
        Ok(())
    }

    fn write_char(&mut self, v: u16) -> Result<()> {
        self.buffer.put_u16(v);
        Ok(())
    }

    fn write_int(&mut self, v: i32) -> Result<()> {
        self.buffer.put_i32(v);
        Ok(())
    }

    fn write_long(&mut self, v: i64) -> Result<()> {
        self.buffer.put_i64(v);
        Ok(())
    }

    fn write_float(&mut self, v: f32) -> Result<()> {
        self.buffer.put_f32(v);
        Ok(())
    }

    fn write_double(&mut self, v: f64) -> Result<()> {
        self.buffer.put_f64(v);
        Ok(())
    }

    fn write_bytes(&mut self, v: &[u8]) -> Result<()> {
        self.buffer.put_slice(v);
        Ok(())
    }

    fn write_string(&mut self, v: &str) -> Result<()> {
        let bytes = v.as_bytes();
        let len = i32::try_from(bytes.len()).map_err(|_| {
            EjbError::Serialization(format!("string too long: {} bytes", bytes.len()))
        })?;
        self.write_int(len)?;
        self.write_bytes(bytes)
    }
}
