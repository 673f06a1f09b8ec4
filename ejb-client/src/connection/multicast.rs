//! Multicast discovery wrapper.
//!
//! A location such as
//! `multicast://239.255.2.3:6142?group=default&schemes=ejbd,http&timeout=250`
//! names a multicast address rather than a server. The factory sends the
//! group name to that address, collects `group:uri` replies until the timeout
//! elapses, then connects to the first discovered server that accepts.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ejb_core::{EjbError, Result, ServerMetaData};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};
use url::Url;

use super::{Connection, ConnectionFactory};

/// Scheme served by [`MulticastConnectionFactory`].
pub const MULTICAST_SCHEME: &str = "multicast";

const DEFAULT_GROUP: &str = "default";
const DEFAULT_PORT: u16 = 6142;
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default bound on distinct discovered URIs.
pub const DEFAULT_MAX_DISCOVERED: usize = 16;

/// Discovery options parsed from a multicast location.
#[derive(Debug, Clone, PartialEq)]
pub struct MulticastParameters {
    address: SocketAddr,
    group: String,
    schemes: Vec<String>,
    timeout: Duration,
    max: usize,
}

impl MulticastParameters {
    /// Parses a `multicast://host:port?group=..&schemes=..&timeout=..&max=..` location.
    pub fn parse(location: &Url) -> Result<Self> {
        let host = location.host_str().ok_or_else(|| {
            EjbError::Configuration(format!("multicast location {} has no address", location))
        })?;
        let ip: IpAddr = host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse()
            .map_err(|_| {
                EjbError::Configuration(format!("invalid multicast address '{}'", host))
            })?;
        let mut params = Self {
            address: SocketAddr::new(ip, location.port().unwrap_or(DEFAULT_PORT)),
            group: DEFAULT_GROUP.to_string(),
            schemes: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            max: DEFAULT_MAX_DISCOVERED,
        };

        for (key, value) in location.query_pairs() {
            match key.as_ref() {
                "group" => params.group = value.into_owned(),
                "schemes" => {
                    params.schemes = value
                        .split(',')
                        .map(|s| s.trim().to_ascii_lowercase())
                        .filter(|s| !s.is_empty())
                        .collect()
                }
                "timeout" => {
                    params.timeout = value.parse::<u64>().map(Duration::from_millis).map_err(|_| {
                        EjbError::Configuration(format!("invalid multicast timeout '{}'", value))
                    })?
                }
                "max" => {
                    params.max = value.parse::<usize>().ok().filter(|m| *m > 0).ok_or_else(|| {
                        EjbError::Configuration(format!("invalid multicast max '{}'", value))
                    })?
                }
                _ => {}
            }
        }
        Ok(params)
    }

    /// Returns the multicast address.
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Returns the logical group name.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Returns the accepted sub-schemes; empty accepts all.
    pub fn schemes(&self) -> &[String] {
        &self.schemes
    }

    /// Returns how long replies are collected.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the bound on distinct discovered URIs.
    pub fn max(&self) -> usize {
        self.max
    }

    /// Filters raw replies down to distinct URIs of the requested group.
    pub fn accept_replies<I, S>(&self, replies: I) -> Vec<Url>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut found: Vec<Url> = Vec::new();
        for reply in replies {
            if found.len() >= self.max {
                break;
            }
            let Some((group, uri)) = reply.as_ref().trim().split_once(':') else {
                continue;
            };
            if group != self.group {
                continue;
            }
            let Ok(url) = Url::parse(uri) else {
                debug!(reply = reply.as_ref(), "ignoring malformed discovery reply");
                continue;
            };
            if !self.schemes.is_empty() && !self.schemes.iter().any(|s| s == url.scheme()) {
                continue;
            }
            if !found.contains(&url) {
                found.push(url);
            }
        }
        found
    }
}

/// Socket operations used during discovery.
#[async_trait]
trait DiscoverySocket: Send + Sync {
    /// Sends the group query to the multicast address.
    async fn send_query(&self, group: &str, address: SocketAddr) -> Result<()>;

    /// Collects raw replies until the timeout elapses or `limit` arrive.
    async fn receive_replies(&self, timeout: Duration, limit: usize) -> Result<Vec<String>>;
}

struct TokioDiscoverySocket {
    socket: UdpSocket,
}

impl TokioDiscoverySocket {
    async fn bind() -> Result<Self> {
        let socket = UdpSocket::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0))
            .await
            .map_err(|e| EjbError::Connection(format!("failed to bind discovery socket: {}", e)))?;
        Ok(Self { socket })
    }
}

#[async_trait]
impl DiscoverySocket for TokioDiscoverySocket {
    async fn send_query(&self, group: &str, address: SocketAddr) -> Result<()> {
        self.socket
            .send_to(group.as_bytes(), address)
            .await
            .map_err(|e| EjbError::Connection(format!("failed to send discovery query: {}", e)))?;
        debug!(%address, group, "sent multicast discovery query");
        Ok(())
    }

    async fn receive_replies(&self, timeout: Duration, limit: usize) -> Result<Vec<String>> {
        let mut replies = Vec::new();
        let mut buf = [0u8; 1024];
        let deadline = tokio::time::Instant::now() + timeout;

        // Raw replies are capped at four times the URI bound.
        while replies.len() < limit.saturating_mul(4) {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, self.socket.recv_from(&mut buf)).await {
                Ok(Ok((len, from))) => match std::str::from_utf8(&buf[..len]) {
                    Ok(text) => replies.push(text.to_string()),
                    Err(_) => debug!(%from, "ignoring non-UTF-8 discovery reply"),
                },
                Ok(Err(e)) => {
                    debug!("error receiving discovery reply: {}", e);
                    break;
                }
                Err(_) => break,
            }
        }
        Ok(replies)
    }
}

/// Resolves a multicast group to servers and delegates the connect.
pub struct MulticastConnectionFactory {
    delegate: Arc<dyn ConnectionFactory>,
    #[cfg(test)]
    mock_socket: Option<Box<dyn DiscoverySocket>>,
}

impl fmt::Debug for MulticastConnectionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MulticastConnectionFactory").finish_non_exhaustive()
    }
}

impl MulticastConnectionFactory {
    /// Creates a factory that connects discovered servers through `delegate`.
    pub fn new(delegate: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            delegate,
            #[cfg(test)]
            mock_socket: None,
        }
    }

    #[cfg(test)]
    fn with_mock_socket(delegate: Arc<dyn ConnectionFactory>, socket: Box<dyn DiscoverySocket>) -> Self {
        Self {
            delegate,
            mock_socket: Some(socket),
        }
    }

    /// Discovers the servers announcing themselves for the location's group.
    pub async fn discover(&self, params: &MulticastParameters) -> Result<Vec<Url>> {
        #[cfg(test)]
        if let Some(ref socket) = self.mock_socket {
            socket.send_query(params.group(), params.address()).await?;
            let replies = socket.receive_replies(params.timeout(), params.max()).await?;
            return Ok(params.accept_replies(replies));
        }

        let socket = TokioDiscoverySocket::bind().await?;
        socket.send_query(params.group(), params.address()).await?;
        let replies = socket.receive_replies(params.timeout(), params.max()).await?;
        Ok(params.accept_replies(replies))
    }
}

#[async_trait]
impl ConnectionFactory for MulticastConnectionFactory {
    async fn connect(&self, server: &ServerMetaData) -> Result<Box<dyn Connection>> {
        let params = MulticastParameters::parse(server.location())?;
        let discovered = self.discover(&params).await?;
        if discovered.is_empty() {
            warn!(group = params.group(), "multicast discovery found no servers");
            return Err(EjbError::Connection(format!(
                "no servers discovered for group '{}' at {}",
                params.group(),
                params.address()
            )));
        }
        info!(
            group = params.group(),
            count = discovered.len(),
            "multicast discovery found server(s)"
        );

        let mut last_error = None;
        for location in discovered {
            match self.delegate.connect(&ServerMetaData::new(location.clone())).await {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    debug!(%location, error = %e, "discovered server refused connection");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            EjbError::Connection(format!("no discovered server in group '{}'", params.group()))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionFactoryRegistry, ConnectionId};
    use bytes::Bytes;
    use std::sync::Mutex;

    struct MockDiscoverySocket {
        replies: Vec<String>,
        queries: Arc<Mutex<Vec<String>>>,
        should_error: bool,
    }

    #[async_trait]
    impl DiscoverySocket for MockDiscoverySocket {
        async fn send_query(&self, group: &str, _address: SocketAddr) -> Result<()> {
            if self.should_error {
                return Err(EjbError::Connection("mock multicast send error".into()));
            }
            self.queries.lock().unwrap().push(group.to_string());
            Ok(())
        }

        async fn receive_replies(&self, _timeout: Duration, _limit: usize) -> Result<Vec<String>> {
            Ok(self.replies.clone())
        }
    }

    #[derive(Debug)]
    struct Accepted(Url);

    #[async_trait]
    impl Connection for Accepted {
        fn id(&self) -> ConnectionId {
            ConnectionId::new()
        }

        fn location(&self) -> &Url {
            &self.0
        }

        async fn exchange(&mut self, request: Bytes) -> Result<Bytes> {
            Ok(request)
        }

        async fn close(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    /// Accepts only port 2.
    struct PickyFactory;

    #[async_trait]
    impl ConnectionFactory for PickyFactory {
        async fn connect(&self, server: &ServerMetaData) -> Result<Box<dyn Connection>> {
            if server.port() == Some(2) {
                Ok(Box::new(Accepted(server.location().clone())))
            } else {
                Err(EjbError::Connection("refused".into()))
            }
        }
    }

    fn params(query: &str) -> MulticastParameters {
        MulticastParameters::parse(&Url::parse(&format!("multicast://239.255.2.3:6142?{}", query)).unwrap())
            .unwrap()
    }

    #[test]
    fn test_parameter_defaults() {
        let p = MulticastParameters::parse(&Url::parse("multicast://239.255.2.3").unwrap()).unwrap();
        assert_eq!(p.address().port(), DEFAULT_PORT);
        assert_eq!(p.group(), "default");
        assert!(p.schemes().is_empty());
        assert_eq!(p.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(p.max(), DEFAULT_MAX_DISCOVERED);
    }

    #[test]
    fn test_parameters_from_query() {
        let p = params("group=blue&schemes=ejbd,%20HTTP&timeout=250&max=4");
        assert_eq!(p.group(), "blue");
        assert_eq!(p.schemes(), &["ejbd".to_string(), "http".to_string()]);
        assert_eq!(p.timeout(), Duration::from_millis(250));
        assert_eq!(p.max(), 4);
    }

    #[test]
    fn test_invalid_address_is_configuration_error() {
        let err = MulticastParameters::parse(&Url::parse("multicast://not-an-ip:6142").unwrap())
            .unwrap_err();
        assert!(matches!(err, EjbError::Configuration(_)));
    }

    #[test]
    fn test_replies_filtered_by_group_and_scheme() {
        let p = params("group=blue&schemes=ejbd");
        let found = p.accept_replies([
            "blue:ejbd://a:1",
            "red:ejbd://b:1",
            "blue:http://c:1/ejb",
            "garbage",
            "blue:ejbd://a:1",
            "blue:ejbd://d:1",
        ]);
        let found: Vec<&str> = found.iter().map(Url::as_str).collect();
        assert_eq!(found, vec!["ejbd://a:1", "ejbd://d:1"]);
    }

    #[test]
    fn test_replies_bounded_by_max() {
        let p = params("max=3");
        let replies: Vec<String> = (0..100).map(|i| format!("default:ejbd://h{}:1", i)).collect();
        assert_eq!(p.accept_replies(replies).len(), 3);
    }

    #[tokio::test]
    async fn test_connects_first_accepting_server() {
        let queries = Arc::new(Mutex::new(Vec::new()));
        let socket = MockDiscoverySocket {
            replies: vec!["blue:ejbd://h:1".into(), "blue:ejbd://h:2".into()],
            queries: Arc::clone(&queries),
            should_error: false,
        };
        let factory = MulticastConnectionFactory::with_mock_socket(Arc::new(PickyFactory), Box::new(socket));

        let server = ServerMetaData::parse("multicast://239.255.2.3:6142?group=blue").unwrap();
        let conn = factory.connect(&server).await.unwrap();
        assert_eq!(conn.location().as_str(), "ejbd://h:2");
        assert_eq!(queries.lock().unwrap().as_slice(), &["blue".to_string()]);
    }

    #[tokio::test]
    async fn test_nothing_discovered_is_connection_error() {
        let socket = MockDiscoverySocket {
            replies: vec!["other:ejbd://h:2".into()],
            queries: Arc::new(Mutex::new(Vec::new())),
            should_error: false,
        };
        let factory = MulticastConnectionFactory::with_mock_socket(
            Arc::new(ConnectionFactoryRegistry::new()),
            Box::new(socket),
        );
        let server = ServerMetaData::parse("multicast://239.255.2.3:6142?group=blue").unwrap();
        let err = factory.connect(&server).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_send_failure_propagates() {
        let socket = MockDiscoverySocket {
            replies: vec![],
            queries: Arc::new(Mutex::new(Vec::new())),
            should_error: true,
        };
        let factory = MulticastConnectionFactory::with_mock_socket(Arc::new(PickyFactory), Box::new(socket));
        let server = ServerMetaData::parse("multicast://239.255.2.3:6142").unwrap();
        let err = factory.connect(&server).await.unwrap_err();
        assert!(err.to_string().contains("mock multicast send error"));
    }
}
