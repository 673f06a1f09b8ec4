//! Client entry point.

use std::fmt;
use std::sync::Arc;

use ejb_core::protocol::{
    AuthenticationResponse, ClusterRequest, LogoutRequest, LogoutResponse, Request,
    RequestEnvelope, Response, ResponseEnvelope,
};
use ejb_core::{ClassRegistry, ClusterMetaData, EjbError, ObjectCodec, Result, ServerMetaData, Value};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::cluster::{last_resort, ClusterRegistry};
use crate::config::ClientConfig;
use crate::connection::{ConnectionFactoryRegistry, ConnectionManager};
use crate::error::NamingError;
use crate::event::{ClientEvent, EventPublisher};
use crate::invocation::{AsyncPool, HandleRegistry, InterfaceDescriptor, InterfaceRegistry};
use crate::jndi::InitialContext;
use crate::security::{Credentials, IdentityResolver, SecurityContext};

/// Entry point for talking to remote components.
///
/// A client owns every piece of shared state: connection factories, the
/// failed-server set, cached cluster views, the live-proxy registry, the
/// caller identity and the asynchronous pool. Clones share that state.
///
/// # Example
///
/// ```no_run
/// use ejb_client::{ClientConfig, EjbClient, InterfaceDescriptor, MethodDescriptor};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ClientConfig::builder()
///     .provider_url("ejbd://127.0.0.1:4201")
///     .build()?;
/// let client = EjbClient::new(config)?;
/// client.register_interface(
///     InterfaceDescriptor::business("org.acme.Calculator")
///         .with_method(MethodDescriptor::new("add", ["int", "int"])),
/// );
///
/// let context = client.initial_context().await?;
/// let calculator = context.lookup_object("CalculatorRemote").await?;
/// let sum = calculator.invoke("add", vec![1.into(), 2.into()]).await?;
/// println!("{}", sum);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct EjbClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    codec: ObjectCodec,
    manager: ConnectionManager,
    clusters: ClusterRegistry,
    events: EventPublisher,
    security: SecurityContext,
    handles: HandleRegistry,
    interfaces: InterfaceRegistry,
    pool: AsyncPool,
}

/// Builder for [`EjbClient`].
pub struct EjbClientBuilder {
    config: ClientConfig,
    class_registry: Option<ClassRegistry>,
    resolver: Option<Arc<dyn IdentityResolver>>,
    interfaces: InterfaceRegistry,
}

impl EjbClientBuilder {
    /// Sets the classes the codec materializes on decode.
    pub fn class_registry(mut self, registry: ClassRegistry) -> Self {
        self.class_registry = Some(registry);
        self
    }

    /// Replaces the configured identity resolver.
    pub fn identity_resolver(mut self, resolver: Arc<dyn IdentityResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Registers an interface up front.
    pub fn interface(self, interface: InterfaceDescriptor) -> Self {
        self.interfaces.register(interface);
        self
    }

    /// Builds the client. Nothing connects until the first request.
    pub fn build(self) -> Result<EjbClient> {
        let config = self.config;
        let events = EventPublisher::new();

        let serialization = config.serialization();
        let mut codec = ObjectCodec::new()
            .with_filter(serialization.filter().clone())
            .with_max_depth(serialization.max_depth());
        if let Some(registry) = self.class_registry {
            codec = codec.with_registry(registry);
        }

        let security = match self.resolver {
            Some(resolver) => SecurityContext::with_resolver(resolver),
            None => SecurityContext::new(config.security().identity_resolver())?,
        };

        let factories = ConnectionFactoryRegistry::with_defaults(config.network());
        let manager = ConnectionManager::new(factories, events.clone())
            .with_default_strategy(config.network().connection_strategy());

        let pool = AsyncPool::new(config.async_pool().clone(), events.clone());

        debug!(
            strategy = config.network().connection_strategy(),
            resolver = security.resolver().name(),
            "client created"
        );

        Ok(EjbClient {
            inner: Arc::new(ClientInner {
                clusters: ClusterRegistry::new(events.clone()),
                config,
                codec,
                manager,
                events,
                security,
                handles: HandleRegistry::new(),
                interfaces: self.interfaces,
                pool,
            }),
        })
    }
}

impl EjbClient {
    /// Creates a client from a configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Starts building a client.
    pub fn builder(config: ClientConfig) -> EjbClientBuilder {
        EjbClientBuilder {
            config,
            class_registry: None,
            resolver: None,
            interfaces: InterfaceRegistry::new(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Returns the object codec.
    pub fn codec(&self) -> &ObjectCodec {
        &self.inner.codec
    }

    /// Returns the connection factories by scheme.
    ///
    /// Factories registered here are used by every later request.
    pub fn factories(&self) -> &ConnectionFactoryRegistry {
        self.inner.manager.factories()
    }

    /// Returns the connection manager.
    pub fn connection_manager(&self) -> &ConnectionManager {
        &self.inner.manager
    }

    /// Returns the interface registry.
    pub fn interfaces(&self) -> &InterfaceRegistry {
        &self.inner.interfaces
    }

    /// Registers an interface.
    pub fn register_interface(&self, interface: InterfaceDescriptor) {
        self.inner.interfaces.register(interface);
    }

    /// Returns the live-proxy registry.
    pub fn handles(&self) -> &HandleRegistry {
        &self.inner.handles
    }

    /// Returns the identity state.
    pub fn security(&self) -> &SecurityContext {
        &self.inner.security
    }

    /// Returns the asynchronous dispatch pool.
    pub fn pool(&self) -> &AsyncPool {
        &self.inner.pool
    }

    /// Returns the event publisher.
    pub fn events(&self) -> &EventPublisher {
        &self.inner.events
    }

    /// Subscribes to client events.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    /// Returns the cached cluster view for a server.
    pub fn cluster(&self, server: &ServerMetaData) -> Result<ClusterMetaData> {
        self.inner.clusters.get(server)
    }

    /// Opens a naming context on the configured provider URL.
    pub async fn initial_context(&self) -> std::result::Result<InitialContext, NamingError> {
        let url = self.config().network().provider_url().ok_or_else(|| {
            EjbError::Configuration("no provider URL configured".to_string())
        })?;
        InitialContext::connect(self, url).await
    }

    /// Sends one request to a server and returns its response.
    ///
    /// The connection is chosen by the server's cluster view and closed
    /// before this returns, whatever the outcome. A cluster update carried by
    /// the response is merged into the cached view.
    pub async fn execute(
        &self,
        server: &ServerMetaData,
        request: impl Into<Request>,
    ) -> Result<Response> {
        self.send(server, request.into()).await
    }

    #[instrument(
        name = "ejb_client.send",
        skip(self, request),
        fields(server = %server, kind = ?request.request_type())
    )]
    async fn send(&self, server: &ServerMetaData, request: Request) -> Result<Response> {
        let inner = &self.inner;
        let cluster = inner.clusters.get(server)?;
        let request_type = request.request_type();
        let payload = RequestEnvelope::new(cluster.version(), request).to_bytes(&inner.codec)?;

        let mut connection = inner.manager.connect(&cluster, last_resort(server)).await?;
        let id = connection.id();
        debug!(connection = %id, location = %connection.location(), bytes = payload.len(), "sending request");
        let exchanged = connection.exchange(payload).await;
        if let Err(e) = connection.close().await {
            debug!(connection = %id, error = %e, "connection close failed");
        }
        let bytes = exchanged?;

        let envelope = ResponseEnvelope::from_bytes(&inner.codec, &bytes)?;
        inner.clusters.apply(server, &envelope.cluster)?;
        if envelope.response.request_type() != request_type {
            return Err(EjbError::Protocol(format!(
                "{:?} request answered with a {:?} response",
                request_type,
                envelope.response.request_type()
            )));
        }
        Ok(envelope.response)
    }

    /// Performs an authentication handshake without changing any state.
    pub async fn authenticate(
        &self,
        server: &ServerMetaData,
        credentials: &Credentials,
    ) -> Result<AuthenticationResponse> {
        let request = credentials.to_request(self.config().security().realm());
        match self.execute(server, request).await? {
            Response::Authentication(response) => Ok(response),
            other => Err(EjbError::Protocol(format!(
                "authentication answered with a {:?} response",
                other.request_type()
            ))),
        }
    }

    /// Logs in process-wide; later requests carry the returned identity.
    pub async fn login(&self, server: &ServerMetaData, credentials: &Credentials) -> Result<Value> {
        let identity = match self.authenticate(server, credentials).await? {
            AuthenticationResponse::Granted(client) => client.into_identity(),
            AuthenticationResponse::Redirected(client, location) => {
                debug!(redirect = %location, "login redirected");
                client.into_identity()
            }
            AuthenticationResponse::Denied(reason) => {
                return Err(EjbError::Authentication(
                    reason.unwrap_or_else(|| "login denied".to_string()),
                ))
            }
        };
        info!(principal = credentials.principal().unwrap_or("<token>"), "logged in");
        self.inner.security.login().login(identity.clone());
        Ok(identity)
    }

    /// Releases the process-wide login. Returns false if there was none.
    pub async fn logout(&self, server: &ServerMetaData) -> Result<bool> {
        let Some(identity) = self.inner.security.login().logout() else {
            return Ok(false);
        };
        self.release(server, identity).await?;
        Ok(true)
    }

    /// Sends a logout request for one identity token.
    pub(crate) async fn release(&self, server: &ServerMetaData, identity: Value) -> Result<()> {
        match self.execute(server, LogoutRequest { identity }).await? {
            Response::Logout(LogoutResponse::Success) => Ok(()),
            Response::Logout(LogoutResponse::Failed(reason)) => {
                let reason = reason.unwrap_or_else(|| "logout refused".to_string());
                warn!(server = %server, reason = %reason, "logout failed");
                Err(EjbError::Authentication(reason))
            }
            other => Err(EjbError::Protocol(format!(
                "logout answered with a {:?} response",
                other.request_type()
            ))),
        }
    }

    /// Asks a server for its cluster view. Returns true if the cache changed.
    pub async fn refresh_cluster(&self, server: &ServerMetaData) -> Result<bool> {
        let version = self.inner.clusters.version(server);
        match self.execute(server, ClusterRequest { version }).await? {
            Response::Cluster(response) => self.inner.clusters.apply(server, &response),
            other => Err(EjbError::Protocol(format!(
                "cluster request answered with a {:?} response",
                other.request_type()
            ))),
        }
    }
}

impl fmt::Debug for EjbClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EjbClient")
            .field("manager", &self.inner.manager)
            .field("clusters", &self.inner.clusters)
            .field("security", &self.inner.security)
            .field("interfaces", &self.inner.interfaces)
            .field("pool", &self.inner.pool)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfigBuilder;

    #[test]
    fn test_client_uses_configured_strategy_and_resolver() {
        let config = ClientConfigBuilder::new()
            .connection_strategy("round-robin")
            .security(|s| s.identity_resolver("static"))
            .build()
            .unwrap();
        let client = EjbClient::new(config).unwrap();
        assert_eq!(client.security().resolver().name(), "static");
        assert!(client.factories().supports("ejbd"));
        assert!(client.factories().supports("https"));
    }

    #[test]
    fn test_clones_share_registries() {
        let client = EjbClient::new(ClientConfig::default()).unwrap();
        let clone = client.clone();
        clone.register_interface(InterfaceDescriptor::legacy("org.acme.Home"));
        assert!(client.interfaces().contains("org.acme.Home"));
    }

    #[tokio::test]
    async fn test_initial_context_needs_provider_url() {
        let client = EjbClient::new(ClientConfig::default()).unwrap();
        assert!(matches!(
            client.initial_context().await,
            Err(NamingError::Communication(EjbError::Configuration(_)))
        ));
    }
}
