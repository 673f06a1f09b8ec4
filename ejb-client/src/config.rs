//! Client configuration types and builders.

use std::time::Duration;

use ejb_core::protocol::DEFAULT_MAX_FRAME_LENGTH;
use ejb_core::serialization::DEFAULT_MAX_DEPTH;
use ejb_core::ClassFilter;

/// Default connection strategy name.
pub const DEFAULT_CONNECTION_STRATEGY: &str = "sticky";
/// Default identity resolver name.
pub const DEFAULT_IDENTITY_RESOLVER: &str = "default";
/// Default connect timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default number of always-running asynchronous workers.
const DEFAULT_CORE_THREADS: usize = 10;
/// Default upper bound of asynchronous workers.
const DEFAULT_MAX_THREADS: usize = 20;
/// Default asynchronous queue capacity.
const DEFAULT_QUEUE_SIZE: usize = 50_000;
/// Default time a rejected submission waits to be re-enqueued.
const DEFAULT_OFFER_TIMEOUT: Duration = Duration::from_millis(100);
/// Default idle time before a non-core worker exits.
const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Configuration error returned when validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    message: String,
}

impl ConfigError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Network configuration: where to connect and how.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    provider_url: Option<String>,
    connection_strategy: String,
    connect_timeout: Duration,
    read_timeout: Option<Duration>,
    max_frame_length: usize,
}

impl NetworkConfig {
    /// Returns the provider URL of the naming service, if configured.
    pub fn provider_url(&self) -> Option<&str> {
        self.provider_url.as_deref()
    }

    /// Returns the connection strategy used when a cluster names none.
    pub fn connection_strategy(&self) -> &str {
        &self.connection_strategy
    }

    /// Returns the connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Returns the read timeout, if any.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// Returns the maximum frame length on stream transports.
    pub fn max_frame_length(&self) -> usize {
        self.max_frame_length
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            provider_url: None,
            connection_strategy: DEFAULT_CONNECTION_STRATEGY.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: None,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }
}

/// Builder for `NetworkConfig`.
#[derive(Debug, Clone, Default)]
pub struct NetworkConfigBuilder {
    provider_url: Option<String>,
    connection_strategy: Option<String>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    max_frame_length: Option<usize>,
}

impl NetworkConfigBuilder {
    /// Creates a new network configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the provider URL, e.g. `ejbd://127.0.0.1:4201` or
    /// `failover:sticky:ejbd://a:4201,ejbd://b:4201`.
    pub fn provider_url(mut self, url: impl Into<String>) -> Self {
        self.provider_url = Some(url.into());
        self
    }

    /// Sets the default connection strategy name.
    pub fn connection_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.connection_strategy = Some(strategy.into());
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Sets the maximum frame length.
    pub fn max_frame_length(mut self, length: usize) -> Self {
        self.max_frame_length = Some(length);
        self
    }

    /// Builds the network configuration.
    pub fn build(self) -> Result<NetworkConfig, ConfigError> {
        if let Some(url) = &self.provider_url {
            if url.trim().is_empty() {
                return Err(ConfigError::new("provider URL cannot be empty"));
            }
        }

        let connection_strategy = self
            .connection_strategy
            .unwrap_or_else(|| DEFAULT_CONNECTION_STRATEGY.to_string());
        if !crate::connection::is_known_strategy(&connection_strategy) {
            return Err(ConfigError::new(format!(
                "unknown connection strategy: {}",
                connection_strategy
            )));
        }

        let connect_timeout = self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        if connect_timeout.is_zero() {
            return Err(ConfigError::new("connect timeout must be positive"));
        }

        let max_frame_length = self.max_frame_length.unwrap_or(DEFAULT_MAX_FRAME_LENGTH);
        if max_frame_length == 0 {
            return Err(ConfigError::new("max frame length must be positive"));
        }

        Ok(NetworkConfig {
            provider_url: self.provider_url,
            connection_strategy,
            connect_timeout,
            read_timeout: self.read_timeout,
            max_frame_length,
        })
    }
}

/// Sizing of the asynchronous business-method pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncPoolConfig {
    core_threads: usize,
    max_threads: usize,
    queue_size: usize,
    offer_timeout: Duration,
    keep_alive: Duration,
}

impl AsyncPoolConfig {
    /// Returns the number of always-running workers.
    pub fn core_threads(&self) -> usize {
        self.core_threads
    }

    /// Returns the upper bound of workers.
    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    /// Returns the queue capacity.
    pub fn queue_size(&self) -> usize {
        self.queue_size
    }

    /// Returns how long a rejected submission waits to be re-enqueued.
    pub fn offer_timeout(&self) -> Duration {
        self.offer_timeout
    }

    /// Returns the idle time before a non-core worker exits.
    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }
}

impl Default for AsyncPoolConfig {
    fn default() -> Self {
        Self {
            core_threads: DEFAULT_CORE_THREADS,
            max_threads: DEFAULT_MAX_THREADS,
            queue_size: DEFAULT_QUEUE_SIZE,
            offer_timeout: DEFAULT_OFFER_TIMEOUT,
            keep_alive: DEFAULT_KEEP_ALIVE,
        }
    }
}

/// Builder for `AsyncPoolConfig`.
#[derive(Debug, Clone, Default)]
pub struct AsyncPoolConfigBuilder {
    core_threads: Option<usize>,
    max_threads: Option<usize>,
    queue_size: Option<usize>,
    offer_timeout: Option<Duration>,
    keep_alive: Option<Duration>,
}

impl AsyncPoolConfigBuilder {
    /// Creates a new pool configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of always-running workers.
    pub fn core_threads(mut self, n: usize) -> Self {
        self.core_threads = Some(n);
        self
    }

    /// Sets the upper bound of workers.
    pub fn max_threads(mut self, n: usize) -> Self {
        self.max_threads = Some(n);
        self
    }

    /// Sets the queue capacity.
    pub fn queue_size(mut self, n: usize) -> Self {
        self.queue_size = Some(n);
        self
    }

    /// Sets how long a rejected submission waits to be re-enqueued.
    pub fn offer_timeout(mut self, timeout: Duration) -> Self {
        self.offer_timeout = Some(timeout);
        self
    }

    /// Sets the idle time before a non-core worker exits.
    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = Some(keep_alive);
        self
    }

    /// Builds the pool configuration.
    pub fn build(self) -> Result<AsyncPoolConfig, ConfigError> {
        let core_threads = self.core_threads.unwrap_or(DEFAULT_CORE_THREADS);
        let max_threads = self.max_threads.unwrap_or(DEFAULT_MAX_THREADS.max(core_threads));
        let queue_size = self.queue_size.unwrap_or(DEFAULT_QUEUE_SIZE);

        if max_threads == 0 {
            return Err(ConfigError::new("async pool needs at least one worker"));
        }
        if core_threads > max_threads {
            return Err(ConfigError::new(format!(
                "async core threads ({}) exceed max threads ({})",
                core_threads, max_threads
            )));
        }
        if queue_size == 0 {
            return Err(ConfigError::new("async queue size must be positive"));
        }

        Ok(AsyncPoolConfig {
            core_threads,
            max_threads,
            queue_size,
            offer_timeout: self.offer_timeout.unwrap_or(DEFAULT_OFFER_TIMEOUT),
            keep_alive: self.keep_alive.unwrap_or(DEFAULT_KEEP_ALIVE),
        })
    }
}

/// Deserialization guard for incoming object graphs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializationConfig {
    filter: ClassFilter,
    max_depth: usize,
}

impl SerializationConfig {
    /// Returns the class filter.
    pub fn filter(&self) -> &ClassFilter {
        &self.filter
    }

    /// Returns the maximum object graph depth.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

impl Default for SerializationConfig {
    fn default() -> Self {
        Self {
            filter: ClassFilter::allow_all(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Builder for `SerializationConfig`.
#[derive(Debug, Clone, Default)]
pub struct SerializationConfigBuilder {
    include: Vec<String>,
    exclude: Vec<String>,
    max_depth: Option<usize>,
}

impl SerializationConfigBuilder {
    /// Creates a new serialization configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an include pattern.
    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.include.push(pattern.into());
        self
    }

    /// Adds an exclude pattern.
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    /// Adds comma-separated include patterns.
    pub fn include_list(mut self, list: &str) -> Self {
        self.include
            .extend(ClassFilter::from_lists(list, "").includes().iter().cloned());
        self
    }

    /// Adds comma-separated exclude patterns.
    pub fn exclude_list(mut self, list: &str) -> Self {
        self.exclude
            .extend(ClassFilter::from_lists("", list).excludes().iter().cloned());
        self
    }

    /// Sets the maximum object graph depth.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Builds the serialization configuration.
    pub fn build(self) -> Result<SerializationConfig, ConfigError> {
        for pattern in self.include.iter().chain(self.exclude.iter()) {
            let body = pattern.strip_suffix('*').unwrap_or(pattern);
            if body.contains('*') {
                return Err(ConfigError::new(format!(
                    "invalid class pattern '{}': '*' is only allowed at the end",
                    pattern
                )));
            }
        }
        let max_depth = self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH);
        if max_depth == 0 {
            return Err(ConfigError::new("max depth must be positive"));
        }
        Ok(SerializationConfig {
            filter: ClassFilter::new(self.include, self.exclude),
            max_depth,
        })
    }
}

/// Login and identity settings.
#[derive(Clone, Default)]
pub struct SecurityConfig {
    username: Option<String>,
    password: Option<String>,
    realm: Option<String>,
    identity_resolver: Option<String>,
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("realm", &self.realm)
            .field("identity_resolver", &self.identity_resolver)
            .finish()
    }
}

impl SecurityConfig {
    /// Returns the user name.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Returns the password.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Returns the security realm.
    pub fn realm(&self) -> Option<&str> {
        self.realm.as_deref()
    }

    /// Returns the identity resolver name.
    pub fn identity_resolver(&self) -> &str {
        self.identity_resolver
            .as_deref()
            .unwrap_or(DEFAULT_IDENTITY_RESOLVER)
    }

    /// Returns true if login credentials are configured.
    pub fn has_credentials(&self) -> bool {
        self.username.is_some()
    }
}

/// Builder for `SecurityConfig`.
#[derive(Debug, Clone, Default)]
pub struct SecurityConfigBuilder {
    username: Option<String>,
    password: Option<String>,
    realm: Option<String>,
    identity_resolver: Option<String>,
}

impl SecurityConfigBuilder {
    /// Creates a new security configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets user name and password.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the user name.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the security realm.
    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    /// Selects the identity resolver by name.
    pub fn identity_resolver(mut self, name: impl Into<String>) -> Self {
        self.identity_resolver = Some(name.into());
        self
    }

    /// Builds the security configuration.
    pub fn build(self) -> Result<SecurityConfig, ConfigError> {
        if self.password.is_some() && self.username.is_none() {
            return Err(ConfigError::new("password given without a user name"));
        }
        if let Some(name) = &self.identity_resolver {
            if !crate::security::is_known_resolver(name) {
                return Err(ConfigError::new(format!("unknown identity resolver: {}", name)));
            }
        }
        Ok(SecurityConfig {
            username: self.username,
            password: self.password,
            realm: self.realm,
            identity_resolver: self.identity_resolver,
        })
    }
}

/// Complete client configuration.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    network: NetworkConfig,
    async_pool: AsyncPoolConfig,
    serialization: SerializationConfig,
    security: SecurityConfig,
}

impl ClientConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Returns the network configuration.
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Returns the asynchronous pool configuration.
    pub fn async_pool(&self) -> &AsyncPoolConfig {
        &self.async_pool
    }

    /// Returns the serialization configuration.
    pub fn serialization(&self) -> &SerializationConfig {
        &self.serialization
    }

    /// Returns the security configuration.
    pub fn security(&self) -> &SecurityConfig {
        &self.security
    }
}

/// Builder for `ClientConfig`.
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    network: NetworkConfigBuilder,
    async_pool: AsyncPoolConfigBuilder,
    serialization: SerializationConfigBuilder,
    security: SecurityConfigBuilder,
}

impl ClientConfigBuilder {
    /// Creates a new client configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the provider URL.
    pub fn provider_url(mut self, url: impl Into<String>) -> Self {
        self.network = self.network.provider_url(url);
        self
    }

    /// Sets the default connection strategy.
    pub fn connection_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.network = self.network.connection_strategy(strategy);
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.network = self.network.connect_timeout(timeout);
        self
    }

    /// Sets user name and password.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.security = self.security.credentials(username, password);
        self
    }

    /// Configures networking using a builder function.
    pub fn network<F>(mut self, f: F) -> Self
    where
        F: FnOnce(NetworkConfigBuilder) -> NetworkConfigBuilder,
    {
        self.network = f(self.network);
        self
    }

    /// Configures the asynchronous pool using a builder function.
    pub fn async_pool<F>(mut self, f: F) -> Self
    where
        F: FnOnce(AsyncPoolConfigBuilder) -> AsyncPoolConfigBuilder,
    {
        self.async_pool = f(self.async_pool);
        self
    }

    /// Configures the deserialization guard using a builder function.
    pub fn serialization<F>(mut self, f: F) -> Self
    where
        F: FnOnce(SerializationConfigBuilder) -> SerializationConfigBuilder,
    {
        self.serialization = f(self.serialization);
        self
    }

    /// Configures security using a builder function.
    pub fn security<F>(mut self, f: F) -> Self
    where
        F: FnOnce(SecurityConfigBuilder) -> SecurityConfigBuilder,
    {
        self.security = f(self.security);
        self
    }

    /// Builds the client configuration.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        Ok(ClientConfig {
            network: self.network.build()?,
            async_pool: self.async_pool.build()?,
            serialization: self.serialization.build()?,
            security: self.security.build()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_client_config() {
        let config = ClientConfig::default();
        assert_eq!(config.network().connection_strategy(), "sticky");
        assert!(config.network().provider_url().is_none());
        assert_eq!(config.async_pool().core_threads(), 10);
        assert_eq!(config.async_pool().max_threads(), 20);
        assert_eq!(config.security().identity_resolver(), "default");
        assert!(config.serialization().filter().accepts("any.Class"));
    }

    #[test]
    fn test_builder_provider_url() {
        let config = ClientConfig::builder()
            .provider_url("ejbd://127.0.0.1:4201")
            .build()
            .unwrap();
        assert_eq!(config.network().provider_url(), Some("ejbd://127.0.0.1:4201"));
    }

    #[test]
    fn test_builder_empty_provider_url_fails() {
        let result = ClientConfig::builder().provider_url("  ").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_strategy_fails() {
        let err = ClientConfig::builder()
            .connection_strategy("fastest")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("unknown connection strategy"));
    }

    #[test]
    fn test_pool_core_exceeds_max_fails() {
        let result = ClientConfig::builder()
            .async_pool(|p| p.core_threads(8).max_threads(4))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_pool_max_defaults_to_at_least_core() {
        let config = ClientConfig::builder()
            .async_pool(|p| p.core_threads(32))
            .build()
            .unwrap();
        assert_eq!(config.async_pool().max_threads(), 32);
    }

    #[test]
    fn test_serialization_lists() {
        let config = ClientConfig::builder()
            .serialization(|s| s.include_list("com.acme.*, java.lang.*").exclude("com.acme.internal.*"))
            .build()
            .unwrap();
        let filter = config.serialization().filter();
        assert!(filter.accepts("com.acme.Account"));
        assert!(!filter.accepts("com.acme.internal.Key"));
        assert!(!filter.accepts("org.other.Thing"));
    }

    #[test]
    fn test_serialization_rejects_inner_wildcard() {
        let result = ClientConfig::builder()
            .serialization(|s| s.exclude("com.*.Gadget"))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_security_password_without_user_fails() {
        let result = ClientConfig::builder().security(|s| s.password("x")).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_security_debug_hides_password() {
        let config = ClientConfig::builder()
            .credentials("alice", "secret")
            .build()
            .unwrap();
        let debug = format!("{:?}", config.security());
        assert!(debug.contains("alice"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::new("bad");
        assert_eq!(err.to_string(), "configuration error: bad");
    }

    #[test]
    fn test_client_config_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ClientConfig>();
        assert_send_sync::<ConfigError>();
    }
}
