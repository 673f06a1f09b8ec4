//! Cached cluster views, keyed by the server they were learned from.

use std::fmt;

use dashmap::DashMap;
use ejb_core::protocol::ClusterResponse;
use ejb_core::metadata::parse_location;
use ejb_core::{ClusterMetaData, EjbError, Result, ServerMetaData};
use tracing::{debug, info, warn};
use url::Url;

use crate::event::{ClientEvent, EventPublisher};

/// Meta-scheme wrapping a list of locations: `failover:[strategy:]uri,uri`.
pub const FAILOVER_SCHEME: &str = "failover";

/// Parses a `failover:` location into an unversioned cluster.
///
/// The optional strategy name is recognized by not being followed by `//`.
pub fn parse_failover(location: &Url) -> Result<ClusterMetaData> {
    let raw = location.as_str();
    let body = raw
        .get(FAILOVER_SCHEME.len() + 1..)
        .filter(|_| location.scheme() == FAILOVER_SCHEME)
        .ok_or_else(|| EjbError::Configuration(format!("not a failover location: {}", raw)))?;

    let (strategy, list) = match body.split_once(':') {
        Some((head, tail)) if !tail.starts_with("//") => (Some(head), tail),
        _ => (None, body),
    };

    let locations = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_location)
        .collect::<Result<Vec<_>>>()?;
    if locations.is_empty() {
        return Err(EjbError::Configuration(format!(
            "failover location lists no servers: {}",
            raw
        )));
    }
    if locations.iter().any(|u| u.scheme() == FAILOVER_SCHEME) {
        return Err(EjbError::Configuration(format!(
            "failover locations cannot be nested: {}",
            raw
        )));
    }

    let cluster = ClusterMetaData::new(0, locations);
    Ok(match strategy {
        Some(name) => cluster.with_strategy(name),
        None => cluster,
    })
}

/// Returns the cluster a server location stands for before any update.
pub fn initial_cluster(server: &ServerMetaData) -> Result<ClusterMetaData> {
    if server.scheme() == FAILOVER_SCHEME {
        parse_failover(server.location())
    } else {
        Ok(ClusterMetaData::single(server))
    }
}

/// Returns the location to try after every cluster member failed.
///
/// A `failover:` location is not itself connectable, so it has none.
pub fn last_resort(server: &ServerMetaData) -> Option<&ServerMetaData> {
    (server.scheme() != FAILOVER_SCHEME).then_some(server)
}

/// Cluster views per server, merged from piggybacked cluster responses.
pub struct ClusterRegistry {
    clusters: DashMap<Url, ClusterMetaData>,
    events: EventPublisher,
}

impl ClusterRegistry {
    /// Creates an empty registry.
    pub fn new(events: EventPublisher) -> Self {
        Self {
            clusters: DashMap::new(),
            events,
        }
    }

    /// Returns the cached view for a server, creating the initial one.
    ///
    /// The returned clone shares the sticky hint and round-robin cursor with
    /// the cached view.
    pub fn get(&self, server: &ServerMetaData) -> Result<ClusterMetaData> {
        if let Some(cluster) = self.clusters.get(server.location()) {
            return Ok(cluster.clone());
        }
        let cluster = initial_cluster(server)?;
        let entry = self
            .clusters
            .entry(server.location().clone())
            .or_insert(cluster);
        Ok(entry.clone())
    }

    /// Returns the version of the cached view, or 0 if none is cached.
    pub fn version(&self, server: &ServerMetaData) -> i64 {
        self.clusters
            .get(server.location())
            .map(|c| c.version())
            .unwrap_or(0)
    }

    /// Applies the cluster part of a response. Returns true if the view changed.
    pub fn apply(&self, server: &ServerMetaData, response: &ClusterResponse) -> Result<bool> {
        match response {
            ClusterResponse::Current => Ok(false),
            ClusterResponse::Failure(message) => {
                warn!(server = %server, message = %message, "server failed to report cluster view");
                Ok(false)
            }
            ClusterResponse::Updated(incoming) => {
                // Populate first so the update merges into the shared view.
                self.get(server)?;
                let Some(mut cached) = self.clusters.get_mut(server.location()) else {
                    return Ok(false);
                };
                let previous_version = cached.version();
                if !cached.merge(incoming) {
                    debug!(
                        server = %server,
                        cached = previous_version,
                        incoming = incoming.version(),
                        "ignoring stale cluster view"
                    );
                    return Ok(false);
                }
                let members = cached.locations().len();
                let version = cached.version();
                drop(cached);

                info!(server = %server, previous_version, version, members, "cluster view updated");
                self.events.publish(ClientEvent::ClusterMetaDataUpdated {
                    server: server.location().clone(),
                    previous_version,
                    version,
                    members,
                });
                Ok(true)
            }
        }
    }
}

impl fmt::Debug for ClusterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterRegistry")
            .field("servers", &self.clusters.len())
            .finish()
    }
}
