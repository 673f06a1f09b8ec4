//! Failover-aware connection acquisition.

use std::fmt;

use dashmap::DashSet;
use ejb_core::{ClusterMetaData, EjbError, Result, ServerMetaData};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::strategy::{StrategyRegistry, STICKY};
use super::{Connection, ConnectionFactory, ConnectionFactoryRegistry};
use crate::event::{ClientEvent, EventPublisher};

/// Bookkeeping for one connect call.
#[derive(Default)]
struct Attempt {
    tried: Vec<Url>,
    abandoned: Option<Url>,
    last_error: Option<EjbError>,
}

/// Acquires connections to a cluster, skipping and recording failed members.
///
/// The failed set is shared by every connect call made through this manager,
/// whichever strategy the call uses.
pub struct ConnectionManager {
    factories: ConnectionFactoryRegistry,
    strategies: StrategyRegistry,
    default_strategy: String,
    failed: DashSet<Url>,
    events: EventPublisher,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("factories", &self.factories)
            .field("default_strategy", &self.default_strategy)
            .field("failed", &self.failed.len())
            .finish()
    }
}

impl ConnectionManager {
    /// Creates a manager using the `sticky` strategy by default.
    pub fn new(factories: ConnectionFactoryRegistry, events: EventPublisher) -> Self {
        Self {
            factories,
            strategies: StrategyRegistry::new(),
            default_strategy: STICKY.to_string(),
            failed: DashSet::new(),
            events,
        }
    }

    /// Sets the strategy used when a cluster names none.
    pub fn with_default_strategy(mut self, name: impl Into<String>) -> Self {
        self.default_strategy = name.into();
        self
    }

    /// Replaces the strategy registry.
    pub fn with_strategies(mut self, strategies: StrategyRegistry) -> Self {
        self.strategies = strategies;
        self
    }

    /// Returns the connection factory registry.
    pub fn factories(&self) -> &ConnectionFactoryRegistry {
        &self.factories
    }

    /// Returns the strategy registry.
    pub fn strategies(&self) -> &StrategyRegistry {
        &self.strategies
    }

    /// Returns true if the location is currently known to have failed.
    pub fn is_failed(&self, location: &Url) -> bool {
        self.failed.contains(location)
    }

    /// Returns the locations currently known to have failed, sorted.
    pub fn failed_locations(&self) -> Vec<Url> {
        let mut failed: Vec<Url> = self.failed.iter().map(|u| u.key().clone()).collect();
        failed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        failed
    }

    /// Forgets every recorded failure.
    pub fn clear_failed(&self) {
        self.failed.clear();
    }

    /// Connects to one member of the cluster.
    ///
    /// Candidates come from the cluster's strategy (or the default one);
    /// members in the failed set are skipped. If every candidate was skipped,
    /// they are retried once in strategy order. When all candidates are
    /// exhausted the `last_resort` server is tried, and failing that the call
    /// ends with [`EjbError::ExhaustedAllServers`].
    #[instrument(
        name = "connection_manager.connect",
        skip(self, cluster, last_resort),
        fields(version = cluster.version(), members = cluster.locations().len())
    )]
    pub async fn connect(
        &self,
        cluster: &ClusterMetaData,
        last_resort: Option<&ServerMetaData>,
    ) -> Result<Box<dyn Connection>> {
        let name = cluster
            .connection_strategy()
            .unwrap_or(self.default_strategy.as_str());
        let strategy = self.strategies.get(name)?;

        let mut attempt = Attempt::default();
        let mut skipped = Vec::new();

        for candidate in strategy.candidates(cluster) {
            if self.failed.contains(&candidate) {
                debug!(location = %candidate, "skipping known-failed location");
                skipped.push(candidate);
                continue;
            }
            if let Some(conn) = self.try_candidate(cluster, candidate, &mut attempt).await {
                return Ok(conn);
            }
        }

        if attempt.tried.is_empty() && !skipped.is_empty() {
            debug!(count = skipped.len(), "all candidates marked failed, retrying them");
            for candidate in skipped {
                if let Some(conn) = self.try_candidate(cluster, candidate, &mut attempt).await {
                    return Ok(conn);
                }
            }
        }

        if let Some(server) = last_resort {
            if !attempt.tried.contains(server.location()) {
                debug!(location = %server, "falling back to last-resort location");
                if let Some(conn) = self
                    .try_candidate(cluster, server.location().clone(), &mut attempt)
                    .await
                {
                    return Ok(conn);
                }
            }
        }

        let tried: Vec<&str> = attempt.tried.iter().map(Url::as_str).collect();
        let cause = attempt
            .last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no candidate locations".to_string());
        tracing::error!(tried = ?tried, "exhausted all servers");
        Err(EjbError::ExhaustedAllServers(format!(
            "tried [{}]: {}",
            tried.join(", "),
            cause
        )))
    }

    async fn try_candidate(
        &self,
        cluster: &ClusterMetaData,
        candidate: Url,
        attempt: &mut Attempt,
    ) -> Option<Box<dyn Connection>> {
        if let Some(abandoned) = attempt.abandoned.take() {
            let failed = self.failed_locations();
            let remaining: Vec<Url> = cluster
                .locations()
                .iter()
                .filter(|u| !self.failed.contains(*u))
                .cloned()
                .collect();
            warn!(from = %abandoned, to = %candidate, "failing over");
            self.events.publish(ClientEvent::FailoverSelection {
                candidate: candidate.clone(),
                abandoned,
                failed,
                remaining,
            });
        }

        attempt.tried.push(candidate.clone());
        let server = ServerMetaData::new(candidate.clone());
        match self.factories.connect(&server).await {
            Ok(conn) => {
                self.failed.remove(&candidate);
                if cluster.locations().contains(&candidate) {
                    cluster.set_last_location(candidate.clone());
                }
                info!(location = %candidate, id = %conn.id(), "connected");
                Some(conn)
            }
            Err(e) => {
                warn!(location = %candidate, error = %e, "connection attempt failed");
                self.failed.insert(candidate.clone());
                self.events.publish(ClientEvent::ConnectionFailed {
                    location: candidate.clone(),
                    error: e.to_string(),
                });
                attempt.abandoned = Some(candidate);
                attempt.last_error = Some(e);
                None
            }
        }
    }
}
