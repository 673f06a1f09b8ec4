//! Transport acquisition and failover.

mod connection;
mod factory;
mod http;
mod manager;
mod multicast;
mod socket;
mod strategy;

use std::sync::Arc;

pub use connection::{Connection, ConnectionId};
pub use factory::{ConnectionFactory, ConnectionFactoryRegistry};
pub use http::{HttpConnection, HttpConnectionFactory, HttpParameters};
pub use manager::ConnectionManager;
pub use multicast::{
    MulticastConnectionFactory, MulticastParameters, DEFAULT_MAX_DISCOVERED, MULTICAST_SCHEME,
};
pub use socket::{SocketConnection, SocketConnectionFactory, DEFAULT_SOCKET_PORT, SOCKET_SCHEME};
pub use strategy::{
    is_known_strategy, Candidates, ConnectionStrategy, RandomStrategy, RoundRobinStrategy,
    StickyStrategy, StrategyRegistry,
};

use crate::config::NetworkConfig;

impl ConnectionFactoryRegistry {
    /// Creates a registry with the socket, HTTP(S) and multicast transports.
    ///
    /// The multicast factory delegates to a snapshot of the concrete
    /// transports, so discovered locations never resolve to another
    /// discovery hop.
    pub fn with_defaults(network: &NetworkConfig) -> Self {
        let registry = Self::new();
        registry.register(
            SOCKET_SCHEME,
            Arc::new(
                SocketConnectionFactory::new()
                    .with_connect_timeout(Some(network.connect_timeout()))
                    .with_read_timeout(network.read_timeout())
                    .with_max_frame_length(network.max_frame_length()),
            ),
        );
        let http: Arc<dyn ConnectionFactory> = Arc::new(
            HttpConnectionFactory::new()
                .with_connect_timeout(Some(network.connect_timeout()))
                .with_read_timeout(network.read_timeout()),
        );
        registry.register("http", Arc::clone(&http));
        registry.register("https", http);

        let concrete = registry.snapshot();
        registry.register(
            MULTICAST_SCHEME,
            Arc::new(MulticastConnectionFactory::new(Arc::new(concrete))),
        );
        registry
    }
}
