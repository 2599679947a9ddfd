//! Shutdown coordination.
//!
//! # Phases
//! ```text
//! pre-close hook → trigger broadcast → wait for subscribers and in-flight
//! work → log final state
//! ```
//!
//! One deadline covers the hook and the teardown together. A failing hook
//! or an elapsed deadline degrades the attempt; neither stops the next
//! phase from running.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::time::{timeout_at, Instant};

use crate::lifecycle::drain::WorkTracker;
use crate::lifecycle::error::{BoxError, LifecycleError};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::status::{AttemptKind, Outcome, Status};

/// User callback run before any teardown.
pub type PreCloseHook = Arc<dyn Fn() -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// Runs the pre-close and teardown phases of one attempt.
pub struct ShutdownCoordinator<'a> {
    pub(crate) hook: Option<PreCloseHook>,
    pub(crate) shutdown: &'a Shutdown,
    pub(crate) work: &'a WorkTracker,
    pub(crate) timeout: Duration,
    pub(crate) deadline: Instant,
    pub(crate) kind: AttemptKind,
}

impl<'a> ShutdownCoordinator<'a> {
    /// Start the clock for one attempt; `timeout` runs from now.
    pub(crate) fn new(
        hook: Option<PreCloseHook>,
        shutdown: &'a Shutdown,
        work: &'a WorkTracker,
        timeout: Duration,
        kind: AttemptKind,
    ) -> Self {
        Self {
            hook,
            shutdown,
            work,
            timeout,
            deadline: Instant::now() + timeout,
            kind,
        }
    }

    /// Invoke the pre-close hook, if any, within the attempt deadline.
    pub async fn pre_close(&self, status: Status) -> Status {
        let Some(hook) = &self.hook else {
            return status;
        };

        match timeout_at(self.deadline, hook()).await {
            Ok(Ok(())) => status,
            Ok(Err(e)) => {
                tracing::error!(attempt = %self.kind, error = %e, "Pre-close hook failed");
                status.degrade(LifecycleError::HookFailure(e))
            }
            Err(_) => {
                tracing::warn!(
                    attempt = %self.kind,
                    timeout = ?self.timeout,
                    "Pre-close hook did not finish before the deadline"
                );
                status.degrade(LifecycleError::ShutdownTimeout(self.timeout))
            }
        }
    }

    /// Stop services and drain in-flight work within what is left of the
    /// deadline.
    ///
    /// The broadcast is sent even when the hook used up the whole budget.
    pub async fn teardown(&self, status: Status) -> Status {
        let body = async {
            self.shutdown.trigger();
            self.shutdown.drained().await;
            self.work.wait_idle().await;
        };

        match timeout_at(self.deadline, body).await {
            Ok(()) => {
                tracing::debug!(attempt = %self.kind, "Teardown finished");
                status
            }
            Err(_) => {
                tracing::warn!(
                    attempt = %self.kind,
                    timeout = ?self.timeout,
                    subscribers = self.shutdown.receiver_count(),
                    in_flight = self.work.active_count(),
                    "Teardown did not finish before the deadline"
                );
                status.degrade(LifecycleError::ShutdownTimeout(self.timeout))
            }
        }
    }

    /// Run a complete shutdown attempt.
    pub async fn run(&self) -> Outcome {
        tracing::info!(timeout = ?self.timeout, "Shutting down process");

        let status = self.pre_close(Status::new()).await;
        let status = self.teardown(status).await;

        if status.is_graceful() {
            tracing::info!("Process shut down gracefully");
        } else {
            tracing::warn!(
                degradations = status.degradations().len(),
                "Process shut down, but not gracefully"
            );
        }

        Outcome::Completed {
            kind: AttemptKind::Shutdown,
            status,
        }
    }
}
