//! # e2e-core
//!
//! Core types shared by the fake DLP service and the scenario driver:
//!
//! - [`E2eError`] - error type distinguishing setup failures, mismatches and
//!   timeouts with partial progress
//! - [`CapturedRequest`] - immutable record of one instrumented call
//! - [`CaptureQueue`] - bounded, blocking-on-full handoff from the service to
//!   a verifier
//! - [`CaptureTemplate`] - expected content of a capture
//!
//! ## Example
//!
//! ```rust
//! use e2e_core::{CaptureMethod, CaptureQueue, CapturedRequest, CaptureTemplate};
//!
//! let queue = CaptureQueue::new(CaptureMethod::InspectContent, 16).unwrap();
//! assert_eq!(queue.capacity(), 16);
//!
//! let template = CaptureTemplate::new("ssn", "projects/p/locations/l", "t");
//! let got = CapturedRequest::new(CaptureMethod::InspectContent, "ssn".into(), "projects/p/locations/l", "t");
//! assert!(template.check(&got).is_ok());
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod capture;
mod error;

pub use capture::{
    abbreviate, CaptureMethod, CaptureQueue, CaptureTemplate, CapturedRequest, DEFAULT_QUEUE_CAPACITY,
};
pub use error::E2eError;

/// Result type alias using [`E2eError`].
pub type E2eResult<T> = std::result::Result<T, E2eError>;
