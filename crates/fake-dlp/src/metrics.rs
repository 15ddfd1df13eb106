//! Metrics emitted by the fake DLP server.
//!
//! Counters go through the `metrics` facade; they are no-ops unless the
//! embedding process installs a recorder. Local totals are also kept so tests
//! and logs can report them without one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use e2e_core::CaptureMethod;
use metrics::{counter, gauge};

/// Metrics for the fake DLP server.
#[derive(Debug, Clone, Default)]
pub struct HarnessMetrics {
    inner: Arc<HarnessMetricsInner>,
}

#[derive(Debug, Default)]
struct HarnessMetricsInner {
    calls: AtomicU64,
    captures: AtomicU64,
    abandoned: AtomicU64,
}

impl HarnessMetrics {
    /// Create a new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record any call to the service.
    pub fn record_call(&self, method: &str) {
        self.inner.calls.fetch_add(1, Ordering::Relaxed);
        counter!("fake_dlp_calls_total", "method" => method.to_string()).increment(1);
    }

    /// Record a capture pushed onto its queue.
    pub fn record_capture(&self, method: CaptureMethod, queued: usize) {
        self.inner.captures.fetch_add(1, Ordering::Relaxed);
        counter!("fake_dlp_captures_total", "method" => method.as_str()).increment(1);
        gauge!("fake_dlp_queued_captures", "method" => method.as_str()).set(queued as f64);
    }

    /// Record a capture dropped because the server was stopping.
    pub fn record_abandoned(&self, method: CaptureMethod) {
        self.inner.abandoned.fetch_add(1, Ordering::Relaxed);
        counter!("fake_dlp_abandoned_captures_total", "method" => method.as_str()).increment(1);
    }

    /// Total calls received.
    pub fn calls(&self) -> u64 {
        self.inner.calls.load(Ordering::Relaxed)
    }

    /// Total captures queued.
    pub fn captures(&self) -> u64 {
        self.inner.captures.load(Ordering::Relaxed)
    }

    /// Total captures abandoned at shutdown.
    pub fn abandoned(&self) -> u64 {
        self.inner.abandoned.load(Ordering::Relaxed)
    }
}
