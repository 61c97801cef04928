//! Request context carrying identity, deadline and cancellation.

use crate::error::{ResourceError, ResourceResult};
use std::future::{Future, pending};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use uuid::Uuid;

/// Request context for resource operations.
///
/// Provides a request id for logging plus the deadline and cancellation signal
/// every storage call is raced against.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique identifier for this request
    pub request_id: String,
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

/// Cancels the contexts created alongside it.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

impl RequestContext {
    /// Create a new request context with a specific request ID.
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            deadline: None,
            cancel: None,
        }
    }

    /// Create a new request context with a generated request ID.
    pub fn with_generated_id() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    /// Attach a cancellation signal, returning the handle that fires it.
    pub fn cancellable(mut self) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        self.cancel = Some(rx);
        (self, CancelHandle(tx))
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Fail fast if the context is already done.
    pub fn check(&self) -> ResourceResult<()> {
        if self.is_cancelled() {
            return Err(ResourceError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(ResourceError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drive `operation` until it completes or the context is done.
    ///
    /// A future that is abandoned here is dropped without being polled again.
    pub async fn run<T, F>(&self, operation: F) -> ResourceResult<T>
    where
        F: Future<Output = ResourceResult<T>>,
    {
        self.check()?;

        let mut cancel = self.cancel.clone();
        tokio::select! {
            biased;
            result = operation => result,
            _ = cancelled(&mut cancel) => Err(ResourceError::Canceled),
            _ = expired(self.deadline) => Err(ResourceError::DeadlineExceeded),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::with_generated_id()
    }
}

async fn cancelled(rx: &mut Option<watch::Receiver<bool>>) {
    match rx {
        // A dropped handle can never cancel.
        Some(rx) => {
            let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
            if closed {
                pending::<()>().await;
            }
        }
        None => pending::<()>().await,
    }
}

async fn expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => pending::<()>().await,
    }
}
