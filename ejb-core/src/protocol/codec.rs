//! Length-delimited framing of envelopes for stream transports.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::constants::{DEFAULT_MAX_FRAME_LENGTH, SIZE_OF_FRAME_LENGTH_FIELD};
use crate::error::{EjbError, Result};

/// Codec framing each envelope with a big-endian `u32` length prefix.
///
/// Implements the `tokio_util::codec::{Encoder, Decoder}` traits for use
/// with tokio's framed I/O. Frames larger than the configured maximum are
/// rejected in both directions.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_length: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    /// Creates a codec with the default maximum frame length.
    pub fn new() -> Self {
        Self {
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }

    /// Creates a codec with a custom maximum frame length.
    pub fn with_max_frame_length(max_frame_length: usize) -> Self {
        Self { max_frame_length }
    }

    /// Returns the maximum frame length.
    pub fn max_frame_length(&self) -> usize {
        self.max_frame_length
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = EjbError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        if item.len() > self.max_frame_length {
            return Err(EjbError::Protocol(format!(
                "frame of {} bytes exceeds maximum {}",
                item.len(),
                self.max_frame_length
            )));
        }
        dst.reserve(SIZE_OF_FRAME_LENGTH_FIELD + item.len());
        dst.put_u32(item.len() as u32);
        dst.extend_from_slice(&item);
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = EjbError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < SIZE_OF_FRAME_LENGTH_FIELD {
            return Ok(None);
        }

        let frame_length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if frame_length > self.max_frame_length {
            return Err(EjbError::Protocol(format!(
                "frame of {} bytes exceeds maximum {}",
                frame_length, self.max_frame_length
            )));
        }

        let total = SIZE_OF_FRAME_LENGTH_FIELD + frame_length;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(SIZE_OF_FRAME_LENGTH_FIELD);
        Ok(Some(src.split_to(frame_length)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_prefixes_length() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(Bytes::from_static(b"abc"), &mut buf).unwrap();
        assert_eq!(&buf[..], &[0, 0, 0, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn test_decode_incomplete_length() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&[0x00, 0x00][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_decode_incomplete_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&[0, 0, 0, 5, 1, 2][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_two_frames_in_one_buffer() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(Bytes::from_static(b"one"), &mut buf).unwrap();
        codec.encode(Bytes::from_static(b"second"), &mut buf).unwrap();

        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], b"one");
        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], b"second");
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut codec = FrameCodec::with_max_frame_length(4);
        let mut buf = BytesMut::from(&[0, 0, 0, 9][..]);
        assert!(codec.decode(&mut buf).is_err());

        let mut out = BytesMut::new();
        assert!(codec.encode(Bytes::from_static(b"too long"), &mut out).is_err());
    }
}
