//! Primitive input for the envelope wire format.

use crate::error::{EjbError, Result};
use bytes::Buf;
use std::io::Cursor;

/// Trait for reading primitive values from the envelope wire format.
///
/// All multi-byte values are read in big-endian byte order.
pub trait DataInput {
    /// Reads a single signed byte.
    fn read_byte(&mut self) -> Result<i8>;

    /// Reads a single unsigned byte.
    fn read_u8(&mut self) -> Result<u8>;

    /// Reads a boolean from a single byte.
    fn read_bool(&mut self) -> Result<bool>;

    /// Reads a 16-bit signed integer.
    fn read_short(&mut self) -> Result<i16>;

    /// Reads a 16-bit UTF-16 code unit.
    fn read_char(&mut self) -> Result<u16>;

    /// Reads a 32-bit signed integer.
    fn read_int(&mut self) -> Result<i32>;

    /// Reads a 64-bit signed integer.
    fn read_long(&mut self) -> Result<i64>;

    /// Reads a 32-bit floating point value.
    fn read_float(&mut self) -> Result<f32>;

    /// Reads a 64-bit floating point value.
    fn read_double(&mut self) -> Result<f64>;

    /// Reads the specified number of raw bytes.
    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>>;

    /// Reads an `i32` length-prefixed string.
    fn read_string(&mut self) -> Result<String>;

    /// Returns the number of unread bytes.
    fn remaining(&self) -> usize;

    /// Reads a `u16` length-prefixed string.
    fn read_utf(&mut self) -> Result<String> {
        let len = self.read_char()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes)
            .map_err(|e| EjbError::Serialization(format!("invalid UTF-8 string: {}", e)))
    }

    /// Reads a presence flag followed by the string, if present.
    fn read_nullable_utf(&mut self) -> Result<Option<String>> {
        if self.read_bool()? {
            Ok(Some(self.read_utf()?))
        } else {
            Ok(None)
        }
    }

    /// Reads an `i32` element count and checks it against the unread bytes.
    ///
    /// `min_element_size` is the smallest encoding of one element; a count that
    /// cannot possibly fit is rejected before anything is allocated.
    fn read_length(&mut self, min_element_size: usize) -> Result<usize> {
        let len = self.read_int()?;
        if len < 0 {
            return Err(EjbError::Serialization(format!("negative length: {}", len)));
        }
        let len = len as usize;
        if len.saturating_mul(min_element_size.max(1)) > self.remaining() {
            return Err(EjbError::Serialization(format!(
                "declared length {} exceeds remaining {} bytes",
                len,
                self.remaining()
            )));
        }
        Ok(len)
    }
}

/// A slice-backed implementation of [`DataInput`].
#[derive(Debug)]
pub struct BufferInput<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> BufferInput<'a> {
    /// Creates a new input reading from the given byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    /// Returns the current position in the buffer.
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    fn ensure_remaining(&self, n: usize) -> Result<()> {
        if self.cursor.remaining() < n {
            Err(EjbError::Serialization(format!(
                "insufficient data: need {} bytes, have {}",
                n,
                self.cursor.remaining()
            )))
        } else {
            Ok(())
        }
    }
}

impl DataInput for BufferInput<'_> {
    fn read_byte(&mut self) -> Result<i8> {
        self.ensure_remaining(1)?;
        Ok(self.cursor.get_i8())
    }

    fn read_u8(&mut self) -> Result<u8> {
        self.ensure_remaining(1)?;
        Ok(self.cursor.get_u8())
    }

    fn read_bool(&mut self) -> Result<bool> {
        self.ensure_remaining(1)?;
        Ok(self.cursor.get_u8() != 0)
    }

    fn read_short(&mut self) -> Result<i16> {
        self.ensure_remaining(2)?;
        Ok(self.cursor.get_i16())
    }

    fn read_char(&mut self) -> Result<u16> {
        self.ensure_remaining(2)?;
        Ok(self.cursor.get_u16())
    }

    fn read_int(&mut self) -> Result<i32> {
        self.ensure_remaining(4)?;
        Ok(self.cursor.get_i32())
    }

    fn read_long(&mut self) -> Result<i64> {
        self.ensure_remaining(8)?;
        Ok(self.cursor.get_i64())
    }

    fn read_float(&mut self) -> Result<f32> {
        self.ensure_remaining(4)?;
        Ok(self.cursor.get_f32())
    }

    fn read_double(&mut self) -> Result<f64> {
        self.ensure_remaining(8)?;
        Ok(self.cursor.get_f64())
    }

    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        self.ensure_remaining(len)?;
        let mut buf = vec![0u8; len];
        self.cursor.copy_to_slice(&mut buf);
        Ok(buf)
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_length(1)?;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes)
            .map_err(|e| EjbError::Serialization(format!("invalid UTF-8 string: {}", e)))
    }

    fn remaining(&self) -> usize {
        self.cursor.remaining()
    }
}
