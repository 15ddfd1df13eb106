//! Error types for end-to-end scenarios.
//!
//! This module provides [`E2eError`], a single error type covering every
//! failure a scenario can report. Variants fall in four families:
//!
//! - setup failures (bind, process start, configuration) that abort a scenario
//! - assertion mismatches that carry the expected and the actual value
//! - timeouts that carry how far the awaited effect progressed
//! - plumbing errors (HTTP, I/O, gRPC) passed through from the stack

use std::net::SocketAddr;
use std::time::Duration;

/// Comprehensive error type for end-to-end scenario operations.
///
/// # Example
///
/// ```rust
/// use e2e_core::E2eError;
///
/// fn check_code(got: u16) -> Result<(), E2eError> {
///     if got != 200 {
///         return Err(E2eError::mismatch("status", 200, got));
///     }
///     Ok(())
/// }
///
/// assert!(check_code(503).unwrap_err().to_string().contains("503"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum E2eError {
    /// A listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that was requested.
        addr: SocketAddr,
        /// The underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// An external process failed to start or exited early.
    #[error("process `{command}` failed: {message}")]
    Process {
        /// The command line that was started.
        command: String,
        /// What went wrong.
        message: String,
    },

    /// Invalid harness or step configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// gRPC transport failure.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Optional underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An observed value differs from the expected one.
    #[error("{field}: got {actual}, want {expected}")]
    Mismatch {
        /// Name of the field, header or property being compared.
        field: String,
        /// The expected value.
        expected: String,
        /// The observed value.
        actual: String,
    },

    /// An HTTP response carried an unexpected status code.
    #[error("unexpected status from {url}: got {actual}, want {expected}")]
    Status {
        /// The requested URL.
        url: String,
        /// Expected status code.
        expected: u16,
        /// Received status code.
        actual: u16,
    },

    /// Fewer captures than expected arrived before the deadline.
    #[error("timeout after {waited:?}: {method} received {received} of {expected} requests")]
    CaptureTimeout {
        /// The instrumented method.
        method: String,
        /// Number of captures the verifier waited for.
        expected: usize,
        /// Number of captures received before the deadline.
        received: usize,
        /// The shared deadline that elapsed.
        waited: Duration,
    },

    /// A metric never reached its expected value.
    #[error("timeout after {waited:?}: stat {metric} last observed {}, want {expected}", fmt_observed(.last_observed))]
    StatTimeout {
        /// Metric series name.
        metric: String,
        /// Expected value, as described by the matcher.
        expected: String,
        /// The last value scraped, if the metric was present at all.
        last_observed: Option<f64>,
        /// The deadline that elapsed.
        waited: Duration,
    },

    /// A capture queue lost its receiving side.
    #[error("capture queue for {method} is closed")]
    QueueClosed {
        /// The instrumented method.
        method: String,
    },

    /// A scenario step failed.
    #[error("step {index} ({step}) failed: {source}")]
    Step {
        /// Zero-based position of the step in the scenario.
        index: usize,
        /// Step name.
        step: String,
        /// The step's error.
        #[source]
        source: Box<E2eError>,
    },

    /// HTTP client error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// gRPC call returned a non-OK status.
    #[error("rpc error: {0}")]
    Rpc(#[from] tonic::Status),
}

fn fmt_observed(value: &Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "nothing".to_string(),
    }
}

impl E2eError {
    /// Create a mismatch error from any displayable values.
    pub fn mismatch(
        field: impl Into<String>,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        Self::Mismatch {
            field: field.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a transport error from any error type.
    pub fn transport<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a process error.
    pub fn process(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Process {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Wrap this error with the step that produced it.
    pub fn in_step(self, index: usize, step: impl Into<String>) -> Self {
        Self::Step {
            index,
            step: step.into(),
            source: Box::new(self),
        }
    }

    /// Whether this is a setup failure (the scenario never got to assert anything).
    pub fn is_setup(&self) -> bool {
        match self {
            Self::Bind { .. }
            | Self::Process { .. }
            | Self::Configuration(_)
            | Self::Transport { .. } => true,
            Self::Step { source, .. } => source.is_setup(),
            _ => false,
        }
    }

    /// Whether this error reports a deadline with partial progress.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::CaptureTimeout { .. } | Self::StatTimeout { .. } => true,
            Self::Step { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

/// Convert to tonic::Status for gRPC responses.
impl From<E2eError> for tonic::Status {
    fn from(err: E2eError) -> Self {
        match &err {
            E2eError::Configuration(_) | E2eError::Mismatch { .. } => {
                tonic::Status::invalid_argument(err.to_string())
            }
            E2eError::CaptureTimeout { .. } | E2eError::StatTimeout { .. } => {
                tonic::Status::deadline_exceeded(err.to_string())
            }
            E2eError::QueueClosed { .. } | E2eError::Transport { .. } => {
                tonic::Status::unavailable(err.to_string())
            }
            E2eError::Rpc(status) => status.clone(),
            _ => tonic::Status::internal(err.to_string()),
        }
    }
}
