//! Observable client events.

use std::fmt;

use tokio::sync::broadcast;
use url::Url;

/// Capacity of the event channel; slow subscribers lag rather than block.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events emitted while connecting, invoking and dispatching.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A candidate failed and the next one is about to be tried.
    FailoverSelection {
        /// The candidate about to be attempted.
        candidate: Url,
        /// The candidate just abandoned.
        abandoned: Url,
        /// Every location known to have failed.
        failed: Vec<Url>,
        /// Cluster members not yet known to have failed.
        remaining: Vec<Url>,
    },
    /// A connection attempt failed.
    ConnectionFailed {
        /// The location.
        location: Url,
        /// Failure description.
        error: String,
    },
    /// A newer cluster view replaced the cached one.
    ClusterMetaDataUpdated {
        /// Server the view was received from.
        server: Url,
        /// Previous version.
        previous_version: i64,
        /// New version.
        version: i64,
        /// Member count of the new view.
        members: usize,
    },
    /// A proxy became permanently invalid.
    ReferenceInvalidated {
        /// Deployment of the invalidated proxy.
        deployment_id: String,
        /// Primary key, rendered for display.
        primary_key: String,
        /// Number of handlers invalidated together.
        count: usize,
    },
    /// An asynchronous invocation was dropped because the pool stayed full.
    AsyncTaskRejected {
        /// Client-assigned request id.
        request_id: String,
    },
}

impl ClientEvent {
    /// Returns a short name for this event kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::FailoverSelection { .. } => "FAILOVER_SELECTION",
            Self::ConnectionFailed { .. } => "CONNECTION_FAILED",
            Self::ClusterMetaDataUpdated { .. } => "CLUSTER_META_DATA_UPDATED",
            Self::ReferenceInvalidated { .. } => "REFERENCE_INVALIDATED",
            Self::AsyncTaskRejected { .. } => "ASYNC_TASK_REJECTED",
        }
    }
}

impl fmt::Display for ClientEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailoverSelection {
                candidate,
                abandoned,
                ..
            } => write!(f, "{}: {} -> {}", self.name(), abandoned, candidate),
            Self::ConnectionFailed { location, error } => {
                write!(f, "{}: {} ({})", self.name(), location, error)
            }
            Self::ClusterMetaDataUpdated {
                server, version, ..
            } => write!(f, "{}: {} v{}", self.name(), server, version),
            Self::ReferenceInvalidated {
                deployment_id,
                primary_key,
                count,
            } => write!(f, "{}: {}[{}] x{}", self.name(), deployment_id, primary_key, count),
            Self::AsyncTaskRejected { request_id } => write!(f, "{}: {}", self.name(), request_id),
        }
    }
}

/// Fan-out publisher shared by every component of one client.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<ClientEvent>,
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher {
    /// Creates a publisher with no subscribers.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Subscribes to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event; dropped silently if nobody listens.
    pub fn publish(&self, event: ClientEvent) {
        let _ = self.sender.send(event);
    }
}
