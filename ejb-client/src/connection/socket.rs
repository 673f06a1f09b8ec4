//! Plain TCP transport with length-prefixed framing.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use ejb_core::protocol::FrameCodec;
use ejb_core::{EjbError, Result, ServerMetaData};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;
use url::Url;

use super::{Connection, ConnectionFactory, ConnectionId};

/// Scheme served by [`SocketConnectionFactory`].
pub const SOCKET_SCHEME: &str = "ejbd";

/// Default port when the location names none.
pub const DEFAULT_SOCKET_PORT: u16 = 4201;

/// A framed TCP connection.
pub struct SocketConnection {
    id: ConnectionId,
    location: Url,
    stream: TcpStream,
    codec: FrameCodec,
    read_buffer: BytesMut,
    read_timeout: Option<Duration>,
}

impl SocketConnection {
    /// Opens a connection to the server's host and port.
    pub async fn connect(
        server: &ServerMetaData,
        connect_timeout: Option<Duration>,
        read_timeout: Option<Duration>,
        max_frame_length: usize,
    ) -> Result<Self> {
        let address = resolve_address(server).await?;
        let connect = TcpStream::connect(address);
        let stream = match connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connect).await.map_err(|_| {
                EjbError::Timeout(format!("connect to {} timed out after {:?}", address, limit))
            })?,
            None => connect.await,
        }
        .map_err(|e| EjbError::Connection(format!("failed to connect to {}: {}", address, e)))?;

        stream.set_nodelay(true).map_err(|e| {
            EjbError::Connection(format!("failed to set TCP_NODELAY on {}: {}", address, e))
        })?;

        let id = ConnectionId::new();
        debug!(%id, %address, "socket connection established");

        Ok(Self {
            id,
            location: server.location().clone(),
            stream,
            codec: FrameCodec::with_max_frame_length(max_frame_length),
            read_buffer: BytesMut::with_capacity(8192),
            read_timeout,
        })
    }

    async fn send(&mut self, payload: Bytes) -> Result<()> {
        let mut buf = BytesMut::with_capacity(payload.len() + 4);
        self.codec.encode(payload, &mut buf)?;
        self.stream
            .write_all(&buf)
            .await
            .map_err(|e| EjbError::Connection(format!("failed to send request: {}", e)))?;
        self.stream
            .flush()
            .await
            .map_err(|e| EjbError::Connection(format!("failed to flush request: {}", e)))
    }

    async fn receive(&mut self) -> Result<Bytes> {
        loop {
            if let Some(frame) = self.codec.decode(&mut self.read_buffer)? {
                return Ok(frame.freeze());
            }

            let read = self.stream.read_buf(&mut self.read_buffer);
            let bytes_read = match self.read_timeout {
                Some(limit) => tokio::time::timeout(limit, read).await.map_err(|_| {
                    EjbError::Timeout(format!("no response within {:?}", limit))
                })?,
                None => read.await,
            }
            .map_err(|e| EjbError::Connection(format!("failed to read response: {}", e)))?;

            if bytes_read == 0 {
                return Err(EjbError::Connection(if self.read_buffer.is_empty() {
                    "connection closed before response".to_string()
                } else {
                    "connection closed mid-frame".to_string()
                }));
            }
        }
    }
}

async fn resolve_address(server: &ServerMetaData) -> Result<SocketAddr> {
    let host = server.host().ok_or_else(|| {
        EjbError::Configuration(format!("location {} has no host", server.location()))
    })?;
    let port = server.port().unwrap_or(DEFAULT_SOCKET_PORT);
    let host = host.trim_start_matches('[').trim_end_matches(']');
    tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| EjbError::Connection(format!("cannot resolve {}:{}: {}", host, port, e)))?
        .next()
        .ok_or_else(|| EjbError::Connection(format!("no address for {}:{}", host, port)))
}

impl fmt::Debug for SocketConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketConnection")
            .field("id", &self.id)
            .field("location", &self.location.as_str())
            .finish()
    }
}

#[async_trait]
impl Connection for SocketConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn location(&self) -> &Url {
        &self.location
    }

    async fn exchange(&mut self, request: Bytes) -> Result<Bytes> {
        self.send(request).await?;
        self.receive().await
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        debug!(id = %self.id, "closing socket connection");
        self.stream
            .shutdown()
            .await
            .map_err(|e| EjbError::Connection(format!("failed to close connection: {}", e)))
    }
}

/// Opens [`SocketConnection`]s.
#[derive(Debug, Clone)]
pub struct SocketConnectionFactory {
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    max_frame_length: usize,
}

impl Default for SocketConnectionFactory {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            read_timeout: None,
            max_frame_length: ejb_core::protocol::DEFAULT_MAX_FRAME_LENGTH,
        }
    }
}

impl SocketConnectionFactory {
    /// Creates a factory relying on OS connect defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds each connect attempt.
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Bounds each response read.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets the largest accepted response frame.
    pub fn with_max_frame_length(mut self, max: usize) -> Self {
        self.max_frame_length = max;
        self
    }
}

#[async_trait]
impl ConnectionFactory for SocketConnectionFactory {
    async fn connect(&self, server: &ServerMetaData) -> Result<Box<dyn Connection>> {
        let conn = SocketConnection::connect(
            server,
            self.connect_timeout,
            self.read_timeout,
            self.max_frame_length,
        )
        .await?;
        Ok(Box::new(conn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn echo_server() -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut len = [0u8; 4];
            stream.read_exact(&mut len).await.unwrap();
            let mut body = vec![0u8; u32::from_be_bytes(len) as usize];
            stream.read_exact(&mut body).await.unwrap();
            body.reverse();
            stream.write_all(&(body.len() as u32).to_be_bytes()).await.unwrap();
            stream.write_all(&body).await.unwrap();
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn test_exchange_round_trip() {
        let (addr, server) = echo_server().await;
        let location = ServerMetaData::parse(&format!("ejbd://127.0.0.1:{}", addr.port())).unwrap();
        let factory = SocketConnectionFactory::new()
            .with_connect_timeout(Some(Duration::from_secs(5)))
            .with_read_timeout(Some(Duration::from_secs(5)));

        let mut conn = factory.connect(&location).await.unwrap();
        let reply = conn.exchange(Bytes::from_static(b"abc")).await.unwrap();
        assert_eq!(&reply[..], b"cba");
        conn.close().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let location = ServerMetaData::parse(&format!("ejbd://127.0.0.1:{}", port)).unwrap();
        let err = SocketConnectionFactory::new()
            .connect(&location)
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_peer_close_before_response() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let location = ServerMetaData::parse(&format!("ejbd://127.0.0.1:{}", port)).unwrap();
        let mut conn = SocketConnectionFactory::new().connect(&location).await.unwrap();
        server.await.unwrap();
        let err = conn.exchange(Bytes::from_static(b"x")).await.unwrap_err();
        assert!(matches!(err, EjbError::Connection(_)));
    }
}
