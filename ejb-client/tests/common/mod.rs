//! Common test utilities for integration tests.
//!
//! [`MockServer`] is an in-memory server registered under the `mock` scheme.
//! It decodes every request envelope, records it, and answers through a
//! scripted handler. Hosts can be marked down to exercise failover, and a
//! gate can hold business methods to exercise the asynchronous pool.

#![allow(dead_code)]

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use ejb_client::core::protocol::{
    ClusterResponse, EjbRequest, Request, RequestEnvelope, RequestMethod, Response,
    ResponseEnvelope,
};
use ejb_client::core::{EjbError, ObjectCodec, Result, ServerMetaData};
use ejb_client::{
    ClientConfig, ClientConfigBuilder, ClientEvent, Connection, ConnectionFactory, ConnectionId,
    EjbClient,
};
use tokio::sync::{broadcast, Semaphore};
use url::Url;

pub const MOCK_SCHEME: &str = "mock";

/// Answers one request received at a location. `None` drops the connection.
pub type Script = dyn Fn(&Url, &Request) -> Option<Response> + Send + Sync;

/// A recorded request.
#[derive(Debug, Clone)]
pub struct Received {
    pub location: Url,
    pub cluster_version: i64,
    pub request: Request,
}

impl Received {
    pub fn ejb(&self) -> Option<&EjbRequest> {
        match &self.request {
            Request::Ejb(request) => Some(request),
            _ => None,
        }
    }
}

pub struct MockServer {
    codec: ObjectCodec,
    script: Box<Script>,
    down: Mutex<HashSet<String>>,
    connects: Mutex<Vec<Url>>,
    received: Mutex<Vec<Received>>,
    cluster: Mutex<Option<ClusterResponse>>,
    gate: Option<Semaphore>,
}

impl MockServer {
    pub fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(&Url, &Request) -> Option<Response> + Send + Sync + 'static,
    {
        Arc::new(Self::build(script, None))
    }

    /// Creates a server whose business-method invocations wait for
    /// [`open_gate`](Self::open_gate).
    pub fn gated<F>(script: F) -> Arc<Self>
    where
        F: Fn(&Url, &Request) -> Option<Response> + Send + Sync + 'static,
    {
        Arc::new(Self::build(script, Some(Semaphore::new(0))))
    }

    fn build<F>(script: F, gate: Option<Semaphore>) -> Self
    where
        F: Fn(&Url, &Request) -> Option<Response> + Send + Sync + 'static,
    {
        Self {
            codec: ObjectCodec::new(),
            script: Box::new(script),
            down: Mutex::new(HashSet::new()),
            connects: Mutex::new(Vec::new()),
            received: Mutex::new(Vec::new()),
            cluster: Mutex::new(None),
            gate,
        }
    }

    /// Makes connects to `host` fail.
    pub fn take_down(&self, host: &str) {
        self.down.lock().unwrap().insert(host.to_string());
    }

    pub fn bring_up(&self, host: &str) {
        self.down.lock().unwrap().remove(host);
    }

    /// Piggybacks `response` on the next reply only.
    pub fn push_cluster(&self, response: ClusterResponse) {
        *self.cluster.lock().unwrap() = Some(response);
    }

    /// Lets `n` held invocations proceed.
    pub fn open_gate(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub fn connects(&self) -> Vec<Url> {
        self.connects.lock().unwrap().clone()
    }

    pub fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }

    pub fn invocations(&self) -> Vec<EjbRequest> {
        self.received()
            .iter()
            .filter_map(|r| r.ejb().cloned())
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    /// Waits until at least `n` requests have arrived.
    pub async fn wait_for_requests(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.request_count() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("requests did not arrive in time");
    }

    async fn answer(&self, location: &Url, bytes: &[u8]) -> Result<Bytes> {
        let envelope = RequestEnvelope::from_bytes(&self.codec, bytes)?;
        let is_business = matches!(
            &envelope.request,
            Request::Ejb(r) if r.method == RequestMethod::ObjectBusinessMethod
        );
        self.received.lock().unwrap().push(Received {
            location: location.clone(),
            cluster_version: envelope.cluster_version,
            request: envelope.request.clone(),
        });

        if is_business {
            if let Some(gate) = &self.gate {
                gate.acquire()
                    .await
                    .map_err(|_| EjbError::Connection("gate closed".into()))?
                    .forget();
            }
        }

        let response = (self.script)(location, &envelope.request)
            .ok_or_else(|| EjbError::Connection(format!("{} hung up", location)))?;
        let cluster = self
            .cluster
            .lock()
            .unwrap()
            .take()
            .unwrap_or(ClusterResponse::Current);
        ResponseEnvelope::new(cluster, response).to_bytes(&self.codec)
    }
}

/// Connection factory serving the `mock` scheme from a [`MockServer`].
pub struct MockFactory {
    server: Arc<MockServer>,
}

impl MockFactory {
    pub fn new(server: Arc<MockServer>) -> Arc<Self> {
        Arc::new(Self { server })
    }
}

#[async_trait]
impl ConnectionFactory for MockFactory {
    async fn connect(&self, server: &ServerMetaData) -> Result<Box<dyn Connection>> {
        let location = server.location().clone();
        self.server.connects.lock().unwrap().push(location.clone());
        let host = location.host_str().unwrap_or_default().to_string();
        if self.server.down.lock().unwrap().contains(&host) {
            return Err(EjbError::Connection(format!("{} refused", location)));
        }
        Ok(Box::new(MockConnection {
            id: ConnectionId::new(),
            location,
            server: Arc::clone(&self.server),
        }))
    }
}

pub struct MockConnection {
    id: ConnectionId,
    location: Url,
    server: Arc<MockServer>,
}

impl fmt::Debug for MockConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockConnection")
            .field("id", &self.id)
            .field("location", &self.location.as_str())
            .finish()
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn location(&self) -> &Url {
        &self.location
    }

    async fn exchange(&mut self, request: Bytes) -> Result<Bytes> {
        self.server.answer(&self.location, &request).await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

pub fn mock_config(provider_url: &str) -> ClientConfig {
    ClientConfigBuilder::new()
        .provider_url(provider_url)
        .build()
        .expect("failed to build config")
}

/// Creates a client with the mock transport registered.
pub fn mock_client(config: ClientConfig, server: &Arc<MockServer>) -> EjbClient {
    let client = EjbClient::new(config).expect("failed to create client");
    client
        .factories()
        .register(MOCK_SCHEME, MockFactory::new(Arc::clone(server)));
    client
}

pub fn server(location: &str) -> ServerMetaData {
    ServerMetaData::parse(location).expect("invalid location")
}

/// Drains every event currently buffered on a subscription.
pub fn drain_events(events: &mut broadcast::Receiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}
