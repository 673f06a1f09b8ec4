//! A single exclusively-owned connection to a server.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use ejb_core::Result;
use url::Url;

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generates a new unique connection ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw ID value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A connection carrying one request/response exchange at a time.
///
/// A connection is owned by exactly one call for its whole duration and is
/// never shared. Callers must [`close`](Connection::close) it on every exit
/// path; dropping it releases the underlying resources as well.
#[async_trait]
pub trait Connection: Send + fmt::Debug {
    /// Returns the connection's identifier.
    fn id(&self) -> ConnectionId;

    /// Returns the location this connection is attached to.
    fn location(&self) -> &Url;

    /// Writes one encoded request envelope and reads one response envelope.
    async fn exchange(&mut self, request: Bytes) -> Result<Bytes>;

    /// Releases the connection.
    async fn close(self: Box<Self>) -> Result<()>;
}
