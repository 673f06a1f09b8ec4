//! HTTP(S) tunnel transport.
//!
//! Each exchange POSTs the encoded request envelope and reads the response
//! envelope from the body. Transport options ride on the location's query
//! string and are stripped before the request is sent:
//!
//! | parameter         | meaning                                   |
//! |-------------------|-------------------------------------------|
//! | `authorization`   | literal `Authorization` header value      |
//! | `basic`           | `user:password`, sent as basic auth       |
//! | `connect_timeout` | connect timeout in milliseconds           |
//! | `read_timeout`    | whole-exchange timeout in milliseconds    |
//! | `truststore`      | PEM file of extra trusted roots           |
//! | `keystore`        | PEM file with client certificate and key  |

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use dashmap::DashMap;
use ejb_core::{EjbError, Result, ServerMetaData};
use tracing::debug;
use url::Url;

use super::{Connection, ConnectionFactory, ConnectionId};

const CONTENT_TYPE: &str = "application/octet-stream";

const TRANSPORT_PARAMETERS: [&str; 6] = [
    "authorization",
    "basic",
    "connect_timeout",
    "read_timeout",
    "truststore",
    "keystore",
];

/// Transport options parsed from an HTTP location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpParameters {
    authorization: Option<String>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    truststore: Option<PathBuf>,
    keystore: Option<PathBuf>,
}

impl HttpParameters {
    /// Parses the transport parameters of a location.
    ///
    /// `authorization` wins over `basic` when both are present.
    pub fn parse(location: &Url) -> Result<Self> {
        let mut params = Self::default();
        let mut basic = None;
        for (key, value) in location.query_pairs() {
            match key.as_ref() {
                "authorization" => params.authorization = Some(value.into_owned()),
                "basic" => basic = Some(format!("Basic {}", STANDARD.encode(value.as_bytes()))),
                "connect_timeout" => params.connect_timeout = Some(parse_millis(&key, &value)?),
                "read_timeout" => params.read_timeout = Some(parse_millis(&key, &value)?),
                "truststore" => params.truststore = Some(PathBuf::from(value.as_ref())),
                "keystore" => params.keystore = Some(PathBuf::from(value.as_ref())),
                _ => {}
            }
        }
        if params.authorization.is_none() {
            params.authorization = basic;
        }
        Ok(params)
    }

    /// Returns the `Authorization` header value, if any.
    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    /// Returns the connect timeout.
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    /// Returns the read timeout.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    fn client_key(&self) -> String {
        format!(
            "{:?}|{:?}|{:?}",
            self.connect_timeout, self.truststore, self.keystore
        )
    }
}

fn parse_millis(key: &str, value: &str) -> Result<Duration> {
    value
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| EjbError::Configuration(format!("invalid {} '{}'", key, value)))
}

/// Returns the location with transport parameters removed from its query.
fn endpoint(location: &Url) -> Url {
    let kept: Vec<(String, String)> = location
        .query_pairs()
        .filter(|(k, _)| !TRANSPORT_PARAMETERS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let mut url = location.clone();
    url.set_query(None);
    if !kept.is_empty() {
        url.query_pairs_mut().extend_pairs(kept);
    }
    url
}

/// A single-exchange HTTP tunnel.
pub struct HttpConnection {
    id: ConnectionId,
    location: Url,
    endpoint: Url,
    client: reqwest::Client,
    params: HttpParameters,
}

impl fmt::Debug for HttpConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpConnection")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

#[async_trait]
impl Connection for HttpConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn location(&self) -> &Url {
        &self.location
    }

    async fn exchange(&mut self, request: Bytes) -> Result<Bytes> {
        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .body(request);
        if let Some(auth) = self.params.authorization() {
            builder = builder.header(reqwest::header::AUTHORIZATION, auth);
        }
        if let Some(limit) = self.params.read_timeout() {
            builder = builder.timeout(limit);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                EjbError::Timeout(format!("HTTP request to {} timed out", self.endpoint))
            } else {
                EjbError::Connection(format!("HTTP request to {} failed: {}", self.endpoint, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(EjbError::Connection(format!(
                "HTTP tunnel {} answered {}",
                self.endpoint, status
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| EjbError::Connection(format!("failed to read HTTP response: {}", e)))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        debug!(id = %self.id, "releasing HTTP connection");
        Ok(())
    }
}

/// Opens [`HttpConnection`]s, sharing one client per TLS/timeout profile.
///
/// `connect` opens and drops a TCP connection to the endpoint, so an
/// unreachable member fails during connection selection and the manager can
/// fail over. Requests themselves go through the shared client's pool.
#[derive(Default)]
pub struct HttpConnectionFactory {
    default_connect_timeout: Option<Duration>,
    default_read_timeout: Option<Duration>,
    clients: DashMap<String, reqwest::Client>,
}

impl fmt::Debug for HttpConnectionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpConnectionFactory")
            .field("default_connect_timeout", &self.default_connect_timeout)
            .field("clients", &self.clients.len())
            .finish()
    }
}

impl HttpConnectionFactory {
    /// Creates a factory with no default timeouts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies when the location does not set `connect_timeout`.
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_connect_timeout = timeout;
        self
    }

    /// Applies when the location does not set `read_timeout`.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_read_timeout = timeout;
        self
    }

    async fn client_for(&self, params: &HttpParameters) -> Result<reqwest::Client> {
        let key = params.client_key();
        if let Some(client) = self.clients.get(&key) {
            return Ok(client.clone());
        }

        let mut builder = reqwest::Client::builder();
        if let Some(limit) = params.connect_timeout {
            builder = builder.connect_timeout(limit);
        }
        if let Some(path) = &params.truststore {
            let pem = read_pem(path).await?;
            let certificate = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                EjbError::Configuration(format!("invalid truststore {}: {}", path.display(), e))
            })?;
            builder = builder.add_root_certificate(certificate);
        }
        if let Some(path) = &params.keystore {
            let pem = read_pem(path).await?;
            let identity = reqwest::Identity::from_pem(&pem).map_err(|e| {
                EjbError::Configuration(format!("invalid keystore {}: {}", path.display(), e))
            })?;
            builder = builder.identity(identity);
        }

        let client = builder
            .build()
            .map_err(|e| EjbError::Connection(format!("failed to create HTTP client: {}", e)))?;
        self.clients.insert(key, client.clone());
        Ok(client)
    }
}

async fn read_pem(path: &PathBuf) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| EjbError::Configuration(format!("cannot read {}: {}", path.display(), e)))
}

/// Checks that the endpoint accepts TCP connections.
async fn reach(endpoint: &Url, limit: Option<Duration>) -> Result<()> {
    let host = endpoint
        .host_str()
        .ok_or_else(|| EjbError::Configuration(format!("{} has no host", endpoint)))?;
    let port = endpoint
        .port_or_known_default()
        .ok_or_else(|| EjbError::Configuration(format!("{} has no port", endpoint)))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');

    let attempt = tokio::net::TcpStream::connect((host, port));
    let opened = match limit {
        Some(limit) => tokio::time::timeout(limit, attempt).await.map_err(|_| {
            EjbError::Timeout(format!("connecting to {} timed out", endpoint))
        })?,
        None => attempt.await,
    };
    opened
        .map(drop)
        .map_err(|e| EjbError::Connection(format!("cannot reach {}: {}", endpoint, e)))
}

#[async_trait]
impl ConnectionFactory for HttpConnectionFactory {
    async fn connect(&self, server: &ServerMetaData) -> Result<Box<dyn Connection>> {
        let mut params = HttpParameters::parse(server.location())?;
        if params.connect_timeout.is_none() {
            params.connect_timeout = self.default_connect_timeout;
        }
        if params.read_timeout.is_none() {
            params.read_timeout = self.default_read_timeout;
        }
        let client = self.client_for(&params).await?;
        let endpoint = endpoint(server.location());
        reach(&endpoint, params.connect_timeout).await?;
        let id = ConnectionId::new();
        debug!(%id, endpoint = %endpoint, "HTTP connection opened");

        Ok(Box::new(HttpConnection {
            id,
            location: server.location().clone(),
            endpoint,
            client,
            params,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_auth() {
        let url = Url::parse("http://host:8080/ejb?basic=alice:secret").unwrap();
        let params = HttpParameters::parse(&url).unwrap();
        assert_eq!(params.authorization(), Some("Basic YWxpY2U6c2VjcmV0"));
    }

    #[test]
    fn test_authorization_overrides_basic() {
        let url =
            Url::parse("http://host/ejb?basic=alice:secret&authorization=Bearer%20t0k").unwrap();
        let params = HttpParameters::parse(&url).unwrap();
        assert_eq!(params.authorization(), Some("Bearer t0k"));
    }

    #[test]
    fn test_parse_timeouts() {
        let url = Url::parse("https://host/ejb?connect_timeout=250&read_timeout=1500").unwrap();
        let params = HttpParameters::parse(&url).unwrap();
        assert_eq!(params.connect_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(params.read_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_invalid_timeout_is_configuration_error() {
        let url = Url::parse("http://host/ejb?read_timeout=soon").unwrap();
        assert!(matches!(
            HttpParameters::parse(&url),
            Err(EjbError::Configuration(_))
        ));
    }

    #[test]
    fn test_endpoint_strips_transport_parameters() {
        let url = Url::parse("http://host/ejb?basic=a:b&tenant=blue&read_timeout=10").unwrap();
        assert_eq!(endpoint(&url).as_str(), "http://host/ejb?tenant=blue");

        let bare = Url::parse("http://host/ejb?connect_timeout=5").unwrap();
        assert_eq!(endpoint(&bare).as_str(), "http://host/ejb");
    }

    #[tokio::test]
    async fn test_clients_are_shared_per_profile() {
        let factory = HttpConnectionFactory::new();
        let a = HttpParameters::parse(&Url::parse("http://one/ejb?basic=a:b").unwrap()).unwrap();
        let b = HttpParameters::parse(&Url::parse("http://two/ejb?basic=c:d").unwrap()).unwrap();
        factory.client_for(&a).await.unwrap();
        factory.client_for(&b).await.unwrap();
        assert_eq!(factory.clients.len(), 1);
    }

    #[tokio::test]
    async fn test_connect_opens_socket() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let factory = HttpConnectionFactory::new();
        let server = ServerMetaData::parse(&format!("http://127.0.0.1:{}/ejb", port)).unwrap();

        let conn = factory.connect(&server).await.unwrap();
        assert_eq!(conn.location(), server.location());
        let (_accepted, _) = listener.accept().await.unwrap();
    }

    #[tokio::test]
    async fn test_refused_endpoint_fails_connect() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let factory = HttpConnectionFactory::new();
        let server = ServerMetaData::parse(&format!("http://127.0.0.1:{}/ejb", port)).unwrap();

        let err = factory.connect(&server).await.unwrap_err();
        assert!(matches!(err, EjbError::Connection(_)));
    }

    #[tokio::test]
    async fn test_missing_truststore_is_configuration_error() {
        let factory = HttpConnectionFactory::new();
        let server =
            ServerMetaData::parse("https://host/ejb?truststore=/nonexistent/roots.pem").unwrap();
        let err = factory.connect(&server).await.unwrap_err();
        assert!(matches!(err, EjbError::Configuration(_)));
    }
}
