//! # dlp-e2e
//!
//! End-to-end test harness for a proxy running the DLP filter.
//!
//! A scenario starts a fake Cloud DLP server and the proxy, sends probe
//! traffic through the proxy and then checks three things:
//!
//! - the HTTP responses the proxy returned
//! - the inspection calls that reached the fake DLP server
//! - the counters on the proxy's admin stats page
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dlp_e2e::prelude::*;
//!
//! let body = "Hi, this is my SSN: 987-65-4321.".repeat(1000);
//! let template = CaptureTemplate::new(
//!     body.clone(),
//!     "projects/test-project/locations/test-location",
//!     "test-template",
//! );
//!
//! let mut scenario = Scenario::new("inspect")
//!     .step(StartFakeDlp::new())
//!     .step(StartProcess::new("envoy").args(["-c", "bootstrap.yaml"]))
//!     .step(Repeat::new(10, HttpCall::post("/echo").body(body)))
//!     .step(CaptureVerify::new(CaptureMethod::InspectContent, 20, template))
//!     .step(StatsVerify::new().expect(ExactStat::new("envoy_dlp_stat_inspected", 20.0)));
//!
//! scenario.run(&mut Params::new(Ports::from_base(20000)?)).await?;
//! ```
//!
//! ## Architecture
//!
//! - `dlp-types` - DLP v2 messages and the method catalog
//! - `e2e-core` - error type, captures and the capture queue
//! - `fake-dlp` - the fake DLP gRPC server
//! - `e2e-driver` - steps and the scenario runner
//!
//! This crate (`dlp-e2e`) re-exports all public APIs for convenience.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub use dlp_types as types;
pub use e2e_core as core;
pub use e2e_driver as driver;
pub use fake_dlp as fake;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use dlp_e2e::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use e2e_core::{
        CaptureMethod, CaptureQueue, CaptureTemplate, CapturedRequest, E2eError, E2eResult,
    };

    // Fake DLP server
    pub use fake_dlp::{DlpClient, FakeDlp, FakeDlpBuilder, FakeDlpConfig};

    // Scenario runner
    pub use e2e_driver::{
        AtLeastStat, CaptureVerify, ExactStat, HeaderMatch, HttpCall, MetricsSnapshot, Params,
        Ports, PushConfig, Repeat, Scenario, Sleep, StartFakeDlp, StartProcess, StatMatcher,
        StatsConfig, StatsVerify, Step, Target, TemplateStat,
    };
}

/// Version information for this crate.
pub mod version {
    /// Crate version.
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Minimum supported Rust version.
    pub const MSRV: &str = "1.75";

    /// Get version info as a string.
    pub fn version_string() -> String {
        format!("dlp-e2e {} (MSRV {})", VERSION, MSRV)
    }
}
