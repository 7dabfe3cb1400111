//! Compute service client
//!
//! The backtest engine runs on a separate compute service. One streaming
//! call carries the serialized execution spec out and a sequence of typed
//! events back, terminated by a completion signal or an error. A single
//! attempt is made per call; there is no reconnection or retry.

mod types;
mod ws;

pub use types::{ComputeError, ComputeEvent, EventKind, RunRequest, WireEvent};
pub use ws::WsComputeClient;

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

/// Trait for compute transport implementations
#[async_trait]
pub trait ComputeClient: Send + Sync {
    /// Open a streaming backtest call with a hard deadline
    ///
    /// The transport enforces the deadline: once it elapses, the underlying
    /// call is cancelled and the stream yields
    /// [`ComputeError::DeadlineExceeded`].
    async fn open(
        &self,
        request: RunRequest,
        deadline: Duration,
    ) -> Result<ComputeStream, ComputeError>;
}

/// One inbound event stream from the compute service
///
/// `None` from [`next_event`](Self::next_event) means the call ended
/// cleanly; an `Err` item is a stream-level transport failure.
pub struct ComputeStream {
    events: mpsc::Receiver<Result<ComputeEvent, ComputeError>>,
    cancel: CancelHandle,
}

impl ComputeStream {
    /// Build a stream from its event channel and cancel handle
    pub fn new(
        events: mpsc::Receiver<Result<ComputeEvent, ComputeError>>,
        cancel: CancelHandle,
    ) -> Self {
        Self { events, cancel }
    }

    /// Receive the next inbound event
    pub async fn next_event(&mut self) -> Option<Result<ComputeEvent, ComputeError>> {
        self.events.recv().await
    }

    /// Handle that cancels the underlying call
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}

/// Cancellation handle for an in-flight compute call
///
/// Cloneable; cancelling is idempotent and observable from every clone.
#[derive(Clone, Default)]
pub struct CancelHandle {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelHandle {
    /// Create a fresh, un-cancelled handle
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Whether cancellation has been signalled
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once cancellation is signalled
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_handle_observable_from_clone() {
        let handle = CancelHandle::new();
        let clone = handle.clone();
        assert!(!clone.is_cancelled());

        handle.cancel();
        assert!(clone.is_cancelled());
        // Resolves immediately once cancelled.
        clone.cancelled().await;
    }

    #[tokio::test]
    async fn test_cancel_handle_wakes_waiter() {
        let handle = CancelHandle::new();
        let waiter = handle.clone();

        let task = tokio::spawn(async move { waiter.cancelled().await });
        tokio::task::yield_now().await;
        handle.cancel();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let handle = CancelHandle::new();
        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_stream_yields_events_then_end() {
        let (tx, rx) = mpsc::channel(8);
        let mut stream = ComputeStream::new(rx, CancelHandle::new());

        tx.send(Ok(ComputeEvent::synthetic("complete", serde_json::json!({}))))
            .await
            .unwrap();
        drop(tx);

        let event = stream.next_event().await.unwrap().unwrap();
        assert_eq!(event.kind, EventKind::Complete);
        assert!(stream.next_event().await.is_none());
    }
}
