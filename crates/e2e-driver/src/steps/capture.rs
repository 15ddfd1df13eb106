//! Verification of the calls a fake DLP server captured.

use std::time::Duration;

use async_trait::async_trait;
use e2e_core::{CaptureMethod, CaptureTemplate, CapturedRequest, E2eError, E2eResult};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::params::Params;
use crate::step::Step;
use crate::steps::fake::DEFAULT_FAKE_NAME;

/// Default time allowed for all captures to arrive.
pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
enum Expected {
    /// `count` captures, all matching one template.
    Repeated(CaptureTemplate, usize),
    /// One capture per template, in order.
    Each(Vec<CaptureTemplate>),
}

impl Expected {
    fn count(&self) -> usize {
        match self {
            Self::Repeated(_, count) => *count,
            Self::Each(templates) => templates.len(),
        }
    }

    fn template(&self, index: usize) -> &CaptureTemplate {
        match self {
            Self::Repeated(template, _) => template,
            Self::Each(templates) => &templates[index],
        }
    }
}

/// Wait for a number of captures and check each against its template.
///
/// One deadline bounds the whole wait. If it passes first, the error
/// reports how many captures did arrive. A capture that differs from its
/// template fails the step at once.
#[derive(Debug, Clone)]
pub struct CaptureVerify {
    fake: String,
    method: CaptureMethod,
    expected: Expected,
    timeout: Duration,
}

impl CaptureVerify {
    /// Expect `count` captures of `method`, each matching `template`.
    pub fn new(method: CaptureMethod, count: usize, template: CaptureTemplate) -> Self {
        Self {
            fake: DEFAULT_FAKE_NAME.to_string(),
            method,
            expected: Expected::Repeated(template, count),
            timeout: DEFAULT_CAPTURE_TIMEOUT,
        }
    }

    /// Expect one capture of `method` per template, in order.
    pub fn each(method: CaptureMethod, templates: Vec<CaptureTemplate>) -> Self {
        Self {
            fake: DEFAULT_FAKE_NAME.to_string(),
            method,
            expected: Expected::Each(templates),
            timeout: DEFAULT_CAPTURE_TIMEOUT,
        }
    }

    /// Read from the fake DLP server registered under `name`.
    pub fn fake(mut self, name: impl Into<String>) -> Self {
        self.fake = name.into();
        self
    }

    /// Set the overall deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of captures expected.
    pub fn count(&self) -> usize {
        self.expected.count()
    }

    fn check(&self, index: usize, got: &CapturedRequest) -> E2eResult<()> {
        self.expected.template(index).check(got).map_err(|e| match e {
            E2eError::Mismatch {
                field,
                expected,
                actual,
            } => E2eError::Mismatch {
                field: format!("capture {index}: {field}"),
                expected,
                actual,
            },
            other => other,
        })
    }
}

#[async_trait]
impl Step for CaptureVerify {
    fn name(&self) -> String {
        format!("verify {} x {}", self.count(), self.method)
    }

    async fn run(&mut self, params: &mut Params) -> E2eResult<()> {
        let queue = params.fake(&self.fake)?.queue(self.method)?.clone();
        let expected = self.count();
        let deadline = Instant::now() + self.timeout;

        for received in 0..expected {
            let Some(got) = queue.recv_until(deadline).await else {
                return Err(E2eError::CaptureTimeout {
                    method: self.method.to_string(),
                    expected,
                    received,
                    waited: self.timeout,
                });
            };
            debug!(method = %self.method, index = received, bytes = got.payload().len(), "capture received");
            self.check(received, &got)?;
        }

        info!(method = %self.method, count = expected, "captures verified");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::FakeDlpHandle;
    use e2e_core::CaptureQueue;
    use std::net::SocketAddr;

    const PARENT: &str = "projects/test-project/locations/test-location";

    fn setup() -> (Params, CaptureQueue) {
        let queue = CaptureQueue::new(CaptureMethod::InspectContent, 32).unwrap();
        let mut params = Params::default();
        params.register_fake(
            DEFAULT_FAKE_NAME,
            FakeDlpHandle::new(SocketAddr::from(([127, 0, 0, 1], 0)), [queue.clone()]),
        );
        (params, queue)
    }

    fn capture(payload: &'static str) -> CapturedRequest {
        CapturedRequest::new(
            CaptureMethod::InspectContent,
            payload.into(),
            PARENT,
            "test-template",
        )
    }

    fn template(payload: &'static str) -> CaptureTemplate {
        CaptureTemplate::new(payload, PARENT, "test-template")
    }

    #[tokio::test]
    async fn passes_with_exactly_k_matching() {
        let (mut params, queue) = setup();
        for _ in 0..4 {
            queue.push(capture("ssn")).await.unwrap();
        }
        let mut step = CaptureVerify::new(CaptureMethod::InspectContent, 4, template("ssn"));
        step.run(&mut params).await.unwrap();
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn waits_for_late_captures() {
        let (mut params, queue) = setup();
        let producer = queue.clone();
        tokio::spawn(async move {
            for _ in 0..3 {
                tokio::time::sleep(Duration::from_millis(20)).await;
                producer.push(capture("ssn")).await.unwrap();
            }
        });
        let mut step = CaptureVerify::new(CaptureMethod::InspectContent, 3, template("ssn"));
        step.run(&mut params).await.unwrap();
    }

    #[tokio::test]
    async fn partial_delivery_reports_the_count() {
        let (mut params, queue) = setup();
        for _ in 0..7 {
            queue.push(capture("ssn")).await.unwrap();
        }
        let mut step = CaptureVerify::new(CaptureMethod::InspectContent, 10, template("ssn"))
            .timeout(Duration::from_millis(100));

        match step.run(&mut params).await {
            Err(E2eError::CaptureTimeout {
                expected, received, ..
            }) => {
                assert_eq!(expected, 10);
                assert_eq!(received, 7);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn nothing_arrived_reports_zero() {
        let (mut params, _queue) = setup();
        let mut step = CaptureVerify::new(CaptureMethod::InspectContent, 2, template("ssn"))
            .timeout(Duration::from_millis(50));
        let err = step.run(&mut params).await.unwrap_err();
        assert!(err.to_string().contains("received 0 of 2"));
    }

    #[tokio::test]
    async fn deadline_is_shared_across_receives() {
        let (mut params, queue) = setup();
        let producer = queue.clone();
        // Each capture alone would arrive within the timeout; all of them would not.
        tokio::spawn(async move {
            for _ in 0..10 {
                tokio::time::sleep(Duration::from_millis(60)).await;
                if producer.push(capture("ssn")).await.is_err() {
                    return;
                }
            }
        });

        let start = Instant::now();
        let mut step = CaptureVerify::new(CaptureMethod::InspectContent, 10, template("ssn"))
            .timeout(Duration::from_millis(200));
        let err = step.run(&mut params).await.unwrap_err();
        assert!(start.elapsed() < Duration::from_millis(400));
        match err {
            E2eError::CaptureTimeout { received, .. } => assert!(received < 10),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn mismatch_fails_immediately_with_both_values() {
        let (mut params, queue) = setup();
        queue.push(capture("ssn")).await.unwrap();
        queue.push(capture("different")).await.unwrap();

        let mut step = CaptureVerify::new(CaptureMethod::InspectContent, 2, template("ssn"));
        match step.run(&mut params).await {
            Err(E2eError::Mismatch {
                field,
                expected,
                actual,
            }) => {
                assert!(field.starts_with("capture 1:"));
                assert!(expected.contains("ssn"));
                assert!(actual.contains("different"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn ordered_templates() {
        let (mut params, queue) = setup();
        queue.push(capture("request")).await.unwrap();
        queue.push(capture("response")).await.unwrap();

        let mut step = CaptureVerify::each(
            CaptureMethod::InspectContent,
            vec![template("request"), template("response")],
        );
        assert_eq!(step.count(), 2);
        step.run(&mut params).await.unwrap();
    }

    #[tokio::test]
    async fn missing_queue_is_a_configuration_error() {
        let (mut params, _queue) = setup();
        let mut step =
            CaptureVerify::new(CaptureMethod::HybridInspectJobTrigger, 1, template("ssn"));
        assert!(matches!(
            step.run(&mut params).await,
            Err(E2eError::Configuration(_))
        ));
    }
}
