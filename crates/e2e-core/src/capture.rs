//! Captured calls and the bounded queue that hands them to verifiers.
//!
//! A [`CaptureQueue`] is the single synchronization point between the
//! concurrent fake service and the sequential scenario: handlers push, one
//! verifier at a time drains. The queue never overwrites. A push on a full
//! queue waits for space, so the capacity has to cover the largest backlog a
//! scenario can build before its verifier starts draining.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;

use crate::{E2eError, E2eResult};

/// Default capacity of a capture queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Instrumented methods of the fake DLP service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CaptureMethod {
    /// `InspectContent`
    InspectContent,
    /// `HybridInspectJobTrigger`
    HybridInspectJobTrigger,
}

impl CaptureMethod {
    /// All instrumented methods.
    pub const ALL: [CaptureMethod; 2] = [
        CaptureMethod::InspectContent,
        CaptureMethod::HybridInspectJobTrigger,
    ];

    /// The RPC method name.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InspectContent => "InspectContent",
            Self::HybridInspectJobTrigger => "HybridInspectJobTrigger",
        }
    }

    /// Look up an instrumented method by RPC name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == name)
    }
}

impl fmt::Display for CaptureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One instrumented call, as received by the fake service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRequest {
    method: CaptureMethod,
    payload: Bytes,
    parent: String,
    template_name: String,
}

impl CapturedRequest {
    /// Create a new capture.
    pub fn new(
        method: CaptureMethod,
        payload: Bytes,
        parent: impl Into<String>,
        template_name: impl Into<String>,
    ) -> Self {
        Self {
            method,
            payload,
            parent: parent.into(),
            template_name: template_name.into(),
        }
    }

    /// The method that was called.
    #[inline]
    pub fn method(&self) -> CaptureMethod {
        self.method
    }

    /// The inspected bytes.
    #[inline]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// The parent resource (or job trigger name for hybrid calls).
    #[inline]
    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// The inspect template name.
    #[inline]
    pub fn template_name(&self) -> &str {
        &self.template_name
    }
}

/// The expected content of one capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureTemplate {
    /// Expected payload, compared byte for byte.
    pub payload: Bytes,
    /// Expected parent.
    pub parent: String,
    /// Expected template name.
    pub template_name: String,
}

impl CaptureTemplate {
    /// Create a new template.
    pub fn new(
        payload: impl Into<Bytes>,
        parent: impl Into<String>,
        template_name: impl Into<String>,
    ) -> Self {
        Self {
            payload: payload.into(),
            parent: parent.into(),
            template_name: template_name.into(),
        }
    }

    /// Check a capture against this template.
    ///
    /// Fails on the first differing field with both values in the error.
    pub fn check(&self, got: &CapturedRequest) -> E2eResult<()> {
        if got.payload != self.payload {
            return Err(E2eError::mismatch(
                format!("{} payload", got.method),
                abbreviate(&self.payload),
                abbreviate(&got.payload),
            ));
        }
        if got.parent != self.parent {
            return Err(E2eError::mismatch(
                format!("{} parent", got.method),
                &self.parent,
                &got.parent,
            ));
        }
        if got.template_name != self.template_name {
            return Err(E2eError::mismatch(
                format!("{} template name", got.method),
                &self.template_name,
                &got.template_name,
            ));
        }
        Ok(())
    }
}

/// Render a payload for error messages, keeping long bodies readable.
///
/// Short payloads are quoted whole; longer ones keep a quoted prefix and
/// the total length in bytes.
pub fn abbreviate(bytes: &[u8]) -> String {
    const PREFIX: usize = 64;
    let text = String::from_utf8_lossy(bytes);
    if text.chars().count() <= PREFIX {
        return format!("{:?}", text);
    }
    let head: String = text.chars().take(PREFIX).collect();
    format!("{:?}... ({} bytes)", head, bytes.len())
}

/// Bounded FIFO of captures for one instrumented method.
///
/// Cloning yields another handle to the same queue.
#[derive(Debug, Clone)]
pub struct CaptureQueue {
    method: CaptureMethod,
    capacity: usize,
    tx: mpsc::Sender<CapturedRequest>,
    rx: Arc<Mutex<mpsc::Receiver<CapturedRequest>>>,
}

impl CaptureQueue {
    /// Create a queue holding at most `capacity` unread captures.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `capacity` is zero.
    pub fn new(method: CaptureMethod, capacity: usize) -> E2eResult<Self> {
        if capacity == 0 {
            return Err(E2eError::Configuration(format!(
                "capture queue capacity for {} must be positive",
                method
            )));
        }
        let (tx, rx) = mpsc::channel(capacity);
        Ok(Self {
            method,
            capacity,
            tx,
            rx: Arc::new(Mutex::new(rx)),
        })
    }

    /// The method this queue collects.
    #[inline]
    pub fn method(&self) -> CaptureMethod {
        self.method
    }

    /// Maximum number of unread captures.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of captures waiting to be read.
    pub fn len(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    /// Whether no capture is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a capture, waiting for space while the queue is full.
    pub async fn push(&self, request: CapturedRequest) -> E2eResult<()> {
        self.tx
            .send(request)
            .await
            .map_err(|_| E2eError::QueueClosed {
                method: self.method.to_string(),
            })
    }

    /// Receive the next capture, giving up at `deadline`.
    ///
    /// Returns `None` once the deadline has passed without a capture.
    pub async fn recv_until(&self, deadline: Instant) -> Option<CapturedRequest> {
        let mut rx = tokio::time::timeout_at(deadline, self.rx.lock()).await.ok()?;
        tokio::time::timeout_at(deadline, rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Take every capture currently queued without waiting.
    pub async fn drain(&self) -> Vec<CapturedRequest> {
        let mut rx = self.rx.lock().await;
        let mut drained = Vec::new();
        while let Ok(request) = rx.try_recv() {
            drained.push(request);
        }
        drained
    }
}
