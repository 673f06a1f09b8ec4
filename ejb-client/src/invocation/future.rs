//! Results of asynchronous business methods.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ejb_core::{EjbError, Value};
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

use super::handler::InvocationHandler;
use super::operation::{Call, Operation, Reply};
use super::pool::Job;
use crate::error::InvocationError;

const QUEUED: u8 = 0;
const RUNNING: u8 = 1;
const DONE: u8 = 2;
const CANCELLED: u8 = 3;

/// Pending result of an asynchronous business method.
///
/// The call waits in the client's pool until a worker dispatches it. Until
/// then it can be cancelled locally; once dispatched, cancellation is asked of
/// the server using the call's request id.
pub struct AsyncResult {
    request_id: String,
    state: Arc<AtomicU8>,
    receiver: oneshot::Receiver<Result<Value, InvocationError>>,
    handler: Arc<InvocationHandler>,
}

impl AsyncResult {
    /// Prepares the job for `call` and the result tracking it.
    ///
    /// Must run on the submitting task: the caller identity is resolved
    /// here, since the worker runs outside any scoped identity.
    pub(crate) fn prepare(handler: Arc<InvocationHandler>, call: Call) -> (Self, Job) {
        let request_id = Uuid::new_v4().to_string();
        let call = call
            .with_request_id(request_id.as_str())
            .with_identity(handler.identity());
        let state = Arc::new(AtomicU8::new(QUEUED));
        let (sender, receiver) = oneshot::channel();

        let job_state = Arc::clone(&state);
        let job_handler = Arc::clone(&handler);
        let job: Job = Box::pin(async move {
            if job_state
                .compare_exchange(QUEUED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                debug!("skipping cancelled asynchronous invocation");
                return;
            }
            let result = match job_handler.dispatch(Operation::Business(call)).await {
                Ok(Reply::Value(value)) => Ok(value),
                Ok(other) => Err(job_handler.unexpected(other)),
                Err(e) => Err(e),
            };
            let _ = job_state.compare_exchange(RUNNING, DONE, Ordering::AcqRel, Ordering::Acquire);
            let _ = sender.send(result);
        });

        (
            Self {
                request_id,
                state,
                receiver,
                handler,
            },
            job,
        )
    }

    /// Returns the client-assigned request id.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns true if the call was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    /// Returns true once the call completed or was cancelled.
    pub fn is_done(&self) -> bool {
        matches!(self.state.load(Ordering::Acquire), DONE | CANCELLED)
    }

    /// Attempts to cancel the call.
    ///
    /// A queued call is cancelled locally and never sent. A dispatched call
    /// is cancelled only if the server agrees. A finished call cannot be
    /// cancelled.
    pub async fn cancel(&self, may_interrupt: bool) -> Result<bool, InvocationError> {
        match self
            .state
            .compare_exchange(QUEUED, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                debug!(request_id = %self.request_id, "cancelled queued invocation");
                Ok(true)
            }
            Err(RUNNING) => {
                let reply = self
                    .handler
                    .dispatch(Operation::Cancel {
                        request_id: self.request_id.clone(),
                        may_interrupt,
                    })
                    .await?;
                let cancelled = match reply {
                    Reply::Value(Value::Bool(cancelled)) => cancelled,
                    other => return Err(self.handler.unexpected(other)),
                };
                if cancelled {
                    let _ = self.state.compare_exchange(
                        RUNNING,
                        CANCELLED,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    );
                }
                debug!(request_id = %self.request_id, cancelled, "server cancellation answered");
                Ok(cancelled)
            }
            Err(_) => Ok(false),
        }
    }

    /// Waits for the result.
    pub async fn get(self) -> Result<Value, InvocationError> {
        if self.is_cancelled() {
            return Err(InvocationError::Cancelled);
        }
        let outcome = self.receiver.await;
        if self.state.load(Ordering::Acquire) == CANCELLED {
            return Err(InvocationError::Cancelled);
        }
        outcome.unwrap_or(Err(InvocationError::Cancelled))
    }

    /// Waits for the result for at most `timeout`.
    pub async fn get_timeout(self, timeout: Duration) -> Result<Value, InvocationError> {
        let handler = Arc::clone(&self.handler);
        match tokio::time::timeout(timeout, self.get()).await {
            Ok(result) => result,
            Err(_) => Err(handler.communication_failure(EjbError::Timeout(format!(
                "asynchronous result not available within {:?}",
                timeout
            )))),
        }
    }
}

impl fmt::Debug for AsyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncResult")
            .field("request_id", &self.request_id)
            .field("done", &self.is_done())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
