//! Async client runtime for invoking remote Enterprise JavaBeans.
//!
//! The client turns calls on local proxies into request envelopes, sends
//! them to an application server over a socket, HTTP tunnel or discovered
//! cluster member, and maps the responses back into values or typed errors.
//! It is built on [Tokio](https://tokio.rs/) and every network operation is
//! an `async fn`.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ejb_client::{ClientConfig, EjbClient, InterfaceDescriptor, MethodDescriptor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .provider_url("failover:round-robin:ejbd://10.0.0.1:4201,ejbd://10.0.0.2:4201")
//!         .credentials("alice", "secret")
//!         .build()?;
//!     let client = EjbClient::new(config)?;
//!     client.register_interface(
//!         InterfaceDescriptor::business("org.acme.Calculator")
//!             .with_method(MethodDescriptor::new("add", ["int", "int"])),
//!     );
//!
//!     let context = client.initial_context().await?;
//!     let calculator = context.lookup_object("CalculatorRemote").await?;
//!     let sum = calculator.invoke("add", vec![1.into(), 2.into()]).await?;
//!     println!("{}", sum);
//!
//!     context.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Proxies
//!
//! | Type | Obtain via | Description |
//! |------|-----------|-------------|
//! | [`EjbHome`] | [`InitialContext::lookup_home`] | Create, find and remove component instances |
//! | [`EjbObject`] | [`EjbHome::create`], [`InitialContext::lookup_object`] | Business methods of one instance |
//! | [`Handle`] / [`HomeHandle`] | `get_handle` / `get_home_handle` | Portable references that rebuild proxies |
//! | [`AsyncResult`] | [`EjbObject::invoke_async`] | Pending asynchronous invocation, cancellable |
//!
//! A proxy stays valid until the server reports a system failure for it or
//! it is removed; entity and stateful proxies sharing an identity become
//! invalid together.
//!
//! # Transports and failover
//!
//! Locations select a transport by scheme:
//!
//! - `ejbd://host:port` plain socket
//! - `http://` / `https://` tunnel, with `authorization`, `basic`,
//!   `connect_timeout`, `read_timeout`, `truststore` and `keystore` query
//!   parameters
//! - `multicast://group-address:port?group=name&schemes=ejbd&timeout=500`
//!   discovery
//! - `failover:[strategy:]uri1,uri2,...` cluster of the above
//!
//! Strategies are `sticky` (default), `sticky+random`, `sticky+round-robin`,
//! `random` and `round-robin`. Members that fail are skipped by later calls
//! until they succeed again; subscribe to [`ClientEvent`]s to observe
//! failover.
//!
//! # Configuration
//!
//! Use [`ClientConfig::builder()`](ClientConfig::builder), a file loaded with
//! the `config-file` feature, or [`ClientConfig::from_env`].

#![warn(missing_docs)]

mod client;
pub mod cluster;
pub mod config;
pub mod config_file;
pub mod connection;
pub mod error;
pub mod event;
pub mod invocation;
pub mod jndi;
pub mod security;

pub use client::{EjbClient, EjbClientBuilder};
pub use cluster::ClusterRegistry;
pub use config::{
    AsyncPoolConfig, AsyncPoolConfigBuilder, ClientConfig, ClientConfigBuilder, ConfigError,
    NetworkConfig, NetworkConfigBuilder, SecurityConfig, SecurityConfigBuilder,
    SerializationConfig, SerializationConfigBuilder,
};
#[cfg(feature = "config-file")]
pub use config_file::load_config;
pub use config_file::FileConfig;
pub use connection::{
    Connection, ConnectionFactory, ConnectionFactoryRegistry, ConnectionId, ConnectionManager,
    ConnectionStrategy,
};
pub use ejb_core as core;
pub use ejb_core::{
    ClassFilter, ClassRegistry, ClientMetaData, ClusterMetaData, ComponentType, EjbError,
    EjbMetaData, MethodSignature, RemoteObject, RemoteThrowable, ServerMetaData, Value,
};
pub use error::{InvocationError, NamingError};
pub use event::{ClientEvent, EventPublisher};
pub use invocation::{
    AsyncResult, EjbHome, EjbObject, FindResult, Handle, HomeHandle, InterfaceDescriptor,
    InterfaceStyle, MethodDescriptor,
};
pub use jndi::{Binding, InitialContext, NameClassPair};
pub use security::{Credentials, IdentityResolver};
