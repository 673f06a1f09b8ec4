//! Bounded worker pool for asynchronous business methods.
//!
//! Jobs wait in a bounded queue served by `core_threads` long-lived workers.
//! When the queue is full, extra workers (up to `max_threads`) are started
//! and exit again after `keep_alive` of idleness. A submission that finds the
//! queue full waits up to `offer_timeout` for space before it is rejected.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ejb_core::{EjbError, Result};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error};

use crate::config::AsyncPoolConfig;
use crate::event::{ClientEvent, EventPublisher};

/// A unit of asynchronous work.
pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// The asynchronous dispatch pool of one client.
pub struct AsyncPool {
    config: AsyncPoolConfig,
    sender: mpsc::Sender<Job>,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    workers: Arc<AtomicUsize>,
    events: EventPublisher,
}

impl AsyncPool {
    /// Creates a pool. Workers are started on first use.
    pub fn new(config: AsyncPoolConfig, events: EventPublisher) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_size());
        Self {
            config,
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            workers: Arc::new(AtomicUsize::new(0)),
            events,
        }
    }

    /// Returns the pool sizing.
    pub fn config(&self) -> &AsyncPoolConfig {
        &self.config
    }

    /// Returns the number of running workers.
    pub fn workers(&self) -> usize {
        self.workers.load(Ordering::Acquire)
    }

    /// Returns the number of queued jobs.
    pub fn queued(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Enqueues a job.
    ///
    /// Fails with [`EjbError::Timeout`] if the queue stays full for the offer
    /// timeout; the loss is logged and published as an event.
    pub async fn submit(&self, request_id: &str, job: Job) -> Result<()> {
        while self.spawn_worker(self.config.core_threads(), true) {}
        if self.workers() == 0 {
            self.spawn_worker(self.config.max_threads(), false);
        }

        let job = match self.sender.try_send(job) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(job)) => job,
            Err(TrySendError::Closed(_)) => return Err(self.reject(request_id)),
        };

        self.spawn_worker(self.config.max_threads(), false);
        debug!(request_id, "async queue full, waiting for space");
        match self
            .sender
            .send_timeout(job, self.config.offer_timeout())
            .await
        {
            Ok(()) => Ok(()),
            Err(_) => Err(self.reject(request_id)),
        }
    }

    fn reject(&self, request_id: &str) -> EjbError {
        error!(
            request_id,
            queue_size = self.config.queue_size(),
            workers = self.workers(),
            "asynchronous invocation dropped, pool saturated"
        );
        self.events.publish(ClientEvent::AsyncTaskRejected {
            request_id: request_id.to_string(),
        });
        EjbError::Timeout(format!(
            "asynchronous invocation {} not accepted within {:?}",
            request_id,
            self.config.offer_timeout()
        ))
    }

    /// Starts a worker if fewer than `limit` are running.
    fn spawn_worker(&self, limit: usize, core: bool) -> bool {
        let mut current = self.workers.load(Ordering::Acquire);
        loop {
            if current >= limit {
                return false;
            }
            match self.workers.compare_exchange(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        let receiver = Arc::clone(&self.receiver);
        let workers = Arc::clone(&self.workers);
        let idle_limit = (!core).then(|| self.config.keep_alive());
        debug!(core, workers = current + 1, "starting async worker");

        tokio::spawn(async move {
            loop {
                let next = async { receiver.lock().await.recv().await };
                let job = match idle_limit {
                    Some(idle) => tokio::time::timeout(idle, next).await.ok().flatten(),
                    None => next.await,
                };
                match job {
                    Some(job) => job.await,
                    None => break,
                }
            }
            workers.fetch_sub(1, Ordering::AcqRel);
            debug!(core, "async worker exited");
        });
        true
    }
}

impl fmt::Debug for AsyncPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncPool")
            .field("workers", &self.workers())
            .field("queued", &self.queued())
            .field("config", &self.config)
            .finish()
    }
}
