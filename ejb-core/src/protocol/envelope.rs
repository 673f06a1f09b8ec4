//! Complete request and response envelopes.
//!
//! A request envelope is `header | cluster version | request`; a response
//! envelope is `header | cluster response | response`. Decoding consumes the
//! whole buffer and rejects trailing bytes.

use bytes::Bytes;

use crate::error::{EjbError, Result};
use crate::serialization::{BufferInput, BufferOutput, DataInput, DataOutput, ObjectCodec};

use super::constants::{PROTOCOL_MAGIC, PROTOCOL_MAJOR, PROTOCOL_MINOR};
use super::request::Request;
use super::response::{ClusterResponse, Response};

/// Magic bytes and protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolHeader {
    /// Major version; a mismatch is fatal.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
}

impl Default for ProtocolHeader {
    fn default() -> Self {
        Self {
            major: PROTOCOL_MAJOR,
            minor: PROTOCOL_MINOR,
        }
    }
}

impl ProtocolHeader {
    /// Writes magic and version.
    pub fn encode<W: DataOutput>(&self, out: &mut W) -> Result<()> {
        out.write_bytes(&PROTOCOL_MAGIC)?;
        out.write_u8(self.major)?;
        out.write_u8(self.minor)
    }

    /// Reads and validates magic and version.
    pub fn decode<R: DataInput>(input: &mut R) -> Result<Self> {
        let magic = input.read_bytes(PROTOCOL_MAGIC.len())?;
        if magic != PROTOCOL_MAGIC {
            return Err(EjbError::Protocol(format!("bad protocol magic: {:02x?}", magic)));
        }
        let major = input.read_u8()?;
        let minor = input.read_u8()?;
        if major != PROTOCOL_MAJOR {
            return Err(EjbError::Protocol(format!(
                "unsupported protocol version {}.{} (expected major {})",
                major, minor, PROTOCOL_MAJOR
            )));
        }
        Ok(Self { major, minor })
    }
}

fn ensure_consumed(input: &BufferInput<'_>) -> Result<()> {
    match input.remaining() {
        0 => Ok(()),
        n => Err(EjbError::Protocol(format!("{} trailing bytes after envelope", n))),
    }
}

/// A request as sent on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    /// Protocol header.
    pub header: ProtocolHeader,
    /// Version of the client's cached cluster view for the target.
    pub cluster_version: i64,
    /// The request.
    pub request: Request,
}

impl RequestEnvelope {
    /// Wraps a request with the current protocol header.
    pub fn new(cluster_version: i64, request: impl Into<Request>) -> Self {
        Self {
            header: ProtocolHeader::default(),
            cluster_version,
            request: request.into(),
        }
    }

    /// Encodes the envelope into a buffer.
    pub fn to_bytes(&self, codec: &ObjectCodec) -> Result<Bytes> {
        let mut out = BufferOutput::with_capacity(128);
        self.header.encode(&mut out)?;
        out.write_long(self.cluster_version)?;
        self.request.encode(codec, &mut out)?;
        Ok(out.into_inner().freeze())
    }

    /// Decodes an envelope occupying the whole buffer.
    pub fn from_bytes(codec: &ObjectCodec, data: &[u8]) -> Result<Self> {
        let mut input = BufferInput::new(data);
        let header = ProtocolHeader::decode(&mut input)?;
        let cluster_version = input.read_long()?;
        let request = Request::decode(codec, &mut input)?;
        ensure_consumed(&input)?;
        Ok(Self {
            header,
            cluster_version,
            request,
        })
    }
}

/// A response as received from the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    /// Protocol header.
    pub header: ProtocolHeader,
    /// Piggybacked cluster view exchange.
    pub cluster: ClusterResponse,
    /// The response.
    pub response: Response,
}

impl ResponseEnvelope {
    /// Wraps a response with the current protocol header.
    pub fn new(cluster: ClusterResponse, response: Response) -> Self {
        Self {
            header: ProtocolHeader::default(),
            cluster,
            response,
        }
    }

    /// Encodes the envelope into a buffer.
    pub fn to_bytes(&self, codec: &ObjectCodec) -> Result<Bytes> {
        let mut out = BufferOutput::with_capacity(128);
        self.header.encode(&mut out)?;
        self.cluster.encode(&mut out)?;
        self.response.encode(codec, &mut out)?;
        Ok(out.into_inner().freeze())
    }

    /// Decodes an envelope occupying the whole buffer.
    pub fn from_bytes(codec: &ObjectCodec, data: &[u8]) -> Result<Self> {
        let mut input = BufferInput::new(data);
        let header = ProtocolHeader::decode(&mut input)?;
        let cluster = ClusterResponse::decode(&mut input)?;
        let response = Response::decode(codec, &mut input)?;
        ensure_consumed(&input)?;
        Ok(Self {
            header,
            cluster,
            response,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ClusterMetaData;
    use crate::protocol::{EjbResponse, JndiMethod, JndiRequest};
    use crate::serialization::Value;
    use url::Url;

    #[test]
    fn test_request_envelope_round_trip() {
        let codec = ObjectCodec::new();
        let env = RequestEnvelope::new(5, JndiRequest::new(JndiMethod::Lookup, "AccountBeanRemote"));
        let bytes = env.to_bytes(&codec).unwrap();
        assert_eq!(&bytes[..4], b"EJBP");
        assert_eq!(RequestEnvelope::from_bytes(&codec, &bytes).unwrap(), env);
    }

    #[test]
    fn test_response_envelope_with_cluster_update() {
        let codec = ObjectCodec::new();
        let cluster = ClusterMetaData::new(2, vec![Url::parse("ejbd://a:4201").unwrap()]);
        let env = ResponseEnvelope::new(
            ClusterResponse::Updated(cluster),
            Response::Ejb(EjbResponse::Ok(Value::Int(1))),
        );
        let bytes = env.to_bytes(&codec).unwrap();
        assert_eq!(ResponseEnvelope::from_bytes(&codec, &bytes).unwrap(), env);
    }

    #[test]
    fn test_bad_magic() {
        let codec = ObjectCodec::new();
        let err = RequestEnvelope::from_bytes(&codec, b"XXXX\x04\x07").unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn test_major_version_mismatch() {
        let codec = ObjectCodec::new();
        let mut bytes = RequestEnvelope::new(0, JndiRequest::new(JndiMethod::List, ""))
            .to_bytes(&codec)
            .unwrap()
            .to_vec();
        bytes[4] = PROTOCOL_MAJOR + 1;
        let err = RequestEnvelope::from_bytes(&codec, &bytes).unwrap_err();
        assert!(err.to_string().contains("unsupported protocol version"));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let codec = ObjectCodec::new();
        let env = ResponseEnvelope::new(ClusterResponse::Current, Response::Ejb(EjbResponse::OkNotFound));
        let mut bytes = env.to_bytes(&codec).unwrap().to_vec();
        bytes.push(0);
        let err = ResponseEnvelope::from_bytes(&codec, &bytes).unwrap_err();
        assert!(err.to_string().contains("trailing"));
    }
}
