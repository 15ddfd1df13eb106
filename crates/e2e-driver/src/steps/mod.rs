//! Step implementations.

mod basic;
mod capture;
mod config;
mod fake;
mod probe;
mod process;
mod stats;

pub use basic::{Repeat, Sleep};
pub use capture::{CaptureVerify, DEFAULT_CAPTURE_TIMEOUT};
pub use config::{ConfigTarget, PushConfig};
pub use fake::{StartFakeDlp, DEFAULT_FAKE_NAME};
pub use probe::{HeaderMatch, HttpCall, Target, DEFAULT_HTTP_TIMEOUT};
pub use process::StartProcess;
pub use stats::{StatsConfig, StatsVerify, DEFAULT_STATS_PATH};
