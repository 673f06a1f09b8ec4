//! Scheme-keyed connection factories.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use ejb_core::{EjbError, Result, ServerMetaData};
use tracing::debug;

use super::Connection;

/// Opens connections for the locations of one or more URI schemes.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Opens a new connection to the server.
    async fn connect(&self, server: &ServerMetaData) -> Result<Box<dyn Connection>>;
}

impl fmt::Debug for dyn ConnectionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConnectionFactory")
    }
}

/// Maps URI schemes to connection factories.
///
/// The registry is owned by a client instance and may be extended at runtime.
/// It is itself a [`ConnectionFactory`] that dispatches on the location's
/// scheme, so discovery factories can delegate to it.
#[derive(Default, Clone)]
pub struct ConnectionFactoryRegistry {
    factories: Arc<DashMap<String, Arc<dyn ConnectionFactory>>>,
}

impl ConnectionFactoryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory for a scheme, replacing any previous one.
    pub fn register(&self, scheme: impl Into<String>, factory: Arc<dyn ConnectionFactory>) {
        let scheme = scheme.into().to_ascii_lowercase();
        debug!(scheme = %scheme, "registered connection factory");
        self.factories.insert(scheme, factory);
    }

    /// Returns the factory for a scheme.
    pub fn get(&self, scheme: &str) -> Option<Arc<dyn ConnectionFactory>> {
        self.factories
            .get(&scheme.to_ascii_lowercase())
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Returns true if a factory is registered for the scheme.
    pub fn supports(&self, scheme: &str) -> bool {
        self.factories.contains_key(&scheme.to_ascii_lowercase())
    }

    /// Returns the registered schemes, sorted.
    pub fn schemes(&self) -> Vec<String> {
        let mut schemes: Vec<String> = self.factories.iter().map(|e| e.key().clone()).collect();
        schemes.sort();
        schemes
    }

    /// Returns an independent copy of the current registrations.
    pub fn snapshot(&self) -> Self {
        let copy = Self::new();
        for entry in self.factories.iter() {
            copy.factories
                .insert(entry.key().clone(), Arc::clone(entry.value()));
        }
        copy
    }
}

#[async_trait]
impl ConnectionFactory for ConnectionFactoryRegistry {
    async fn connect(&self, server: &ServerMetaData) -> Result<Box<dyn Connection>> {
        let factory = self.get(server.scheme()).ok_or_else(|| {
            EjbError::Configuration(format!(
                "unsupported connection type: no factory for scheme '{}'",
                server.scheme()
            ))
        })?;
        factory.connect(server).await
    }
}

impl fmt::Debug for ConnectionFactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionFactoryRegistry")
            .field("schemes", &self.schemes())
            .finish()
    }
}
