//! # e2e-driver
//!
//! Scenario runner for end-to-end tests of the DLP proxy filter.
//!
//! A [`Scenario`] is an ordered list of [`Step`]s sharing one [`Params`].
//! Steps run one after another; the first failure stops the run. Every step
//! whose `run` was invoked is then cleaned up, last first, even when an
//! earlier cleanup fails.
//!
//! ## Steps
//!
//! | Step | Does |
//! |------|------|
//! | [`StartFakeDlp`] | starts a fake DLP server and registers its capture queues |
//! | [`PushConfig`] | renders a template to a file or POSTs it |
//! | [`StartProcess`] | spawns the proxy and waits until it is ready |
//! | [`HttpCall`] | sends one request and checks status, body and headers |
//! | [`Repeat`] | runs a step N times in sequence |
//! | [`Sleep`] | waits |
//! | [`CaptureVerify`] | waits for K captures and compares each with a template |
//! | [`StatsVerify`] | polls the admin stats page until the expected values show |
//!
//! ## Example
//!
//! ```rust,ignore
//! use dlp_e2e::prelude::*;
//!
//! let mut params = Params::new(Ports::from_base(20000)?);
//! let mut scenario = Scenario::new("inspect")
//!     .step(StartFakeDlp::new())
//!     .step(Repeat::new(10, HttpCall::post("/echo").body(body)))
//!     .step(CaptureVerify::new(CaptureMethod::InspectContent, 20, template))
//!     .step(StatsVerify::new().expect(ExactStat::new("envoy_dlp_stat_inspected", 20.0)));
//! scenario.run(&mut params).await?;
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod matcher;
pub mod params;
pub mod prometheus;
mod scenario;
mod step;
pub mod steps;

pub use matcher::{AtLeastStat, ExactStat, StatMatcher, TemplateStat};
pub use params::{FakeDlpHandle, Params, Ports, DEFAULT_BASE_PORT};
pub use prometheus::MetricsSnapshot;
pub use scenario::Scenario;
pub use step::Step;
pub use steps::{
    CaptureVerify, ConfigTarget, HeaderMatch, HttpCall, PushConfig, Repeat, Sleep, StartFakeDlp,
    StartProcess, StatsConfig, StatsVerify, Target,
};

