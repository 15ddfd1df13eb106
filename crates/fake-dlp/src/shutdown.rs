//! Shutdown coordination between the fake server and its in-flight calls.
//!
//! Instrumented handlers register themselves for the duration of a call. On
//! stop, the controller flips a watch flag, which makes handlers waiting on
//! a full capture queue give up, and then waits for the registered calls to
//! finish within a grace period.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{info, warn};

/// Controller for coordinating shutdown of the fake server.
#[derive(Debug, Clone)]
pub struct ShutdownController {
    inner: Arc<ShutdownInner>,
}

#[derive(Debug)]
struct ShutdownInner {
    initiated: AtomicBool,
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
    active_ops: AtomicUsize,
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownController {
    /// Create a new shutdown controller.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            inner: Arc::new(ShutdownInner {
                initiated: AtomicBool::new(false),
                tx,
                rx,
                active_ops: AtomicUsize::new(0),
            }),
        }
    }

    /// Check if shutdown has been initiated.
    pub fn is_shutdown(&self) -> bool {
        self.inner.initiated.load(Ordering::SeqCst)
    }

    /// Get a future that resolves when shutdown is initiated.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.inner.rx.clone(),
        }
    }

    /// Flag shutdown without waiting for in-flight calls.
    ///
    /// Returns `false` if shutdown was already initiated.
    pub fn trigger(&self) -> bool {
        if self
            .inner
            .initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        let _ = self.inner.tx.send(true);
        true
    }

    /// Initiate shutdown and wait for in-flight calls.
    ///
    /// Returns `true` if all calls completed within `grace_period`.
    pub async fn shutdown(&self, grace_period: Duration) -> bool {
        if self.trigger() {
            info!(grace_period = ?grace_period, "fake DLP shutting down");
        }

        match timeout(grace_period, self.wait_for_completion()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    remaining_ops = self.active_operations(),
                    "in-flight calls did not finish within the grace period"
                );
                false
            }
        }
    }

    async fn wait_for_completion(&self) {
        while self.active_operations() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Register an in-flight call.
    ///
    /// Returns a guard that deregisters the call when dropped.
    pub fn register_operation(&self) -> OperationGuard {
        self.inner.active_ops.fetch_add(1, Ordering::SeqCst);
        OperationGuard {
            controller: self.clone(),
        }
    }

    /// Get the number of in-flight calls.
    pub fn active_operations(&self) -> usize {
        self.inner.active_ops.load(Ordering::SeqCst)
    }
}

/// Guard for an in-flight call.
#[derive(Debug)]
pub struct OperationGuard {
    controller: ShutdownController,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.controller.inner.active_ops.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Future that resolves when shutdown is initiated.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Wait for the shutdown signal.
    pub async fn wait(mut self) {
        // A closed channel means the controller is gone; treat it as shutdown.
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}
