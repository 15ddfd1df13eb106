//! Scenario tests through the stand-in proxy.
//!
//! One parametrized routine runs every case of [`CASES`].

use std::time::Duration;

use dlp_e2e::prelude::*;
use tokio::net::TcpListener;

use crate::init_tracing;
use crate::proxy::{InspectMode, StartStandInProxy, INSPECTED_HEADER, INSPECTED_STAT};

const PARENT: &str = "projects/test-project/locations/test-location";
const TEMPLATE: &str = "test-template";
const TRIGGER: &str = "projects/test-project/locations/test-location/jobTriggers/test-trigger";

fn ssn_body() -> String {
    "Hi, this is my SSN: 987-65-4321.".repeat(1000)
}

#[derive(Debug, Clone, Copy)]
struct Case {
    name: &'static str,
    repeat: usize,
    delay: Duration,
    hybrid: bool,
    inspect_response: bool,
}

const CASES: &[Case] = &[
    Case {
        name: "single request",
        repeat: 1,
        delay: Duration::ZERO,
        hybrid: false,
        inspect_response: true,
    },
    Case {
        name: "ten requests both directions",
        repeat: 10,
        delay: Duration::ZERO,
        hybrid: false,
        inspect_response: true,
    },
    Case {
        name: "slow DLP backend",
        repeat: 5,
        delay: Duration::from_millis(50),
        hybrid: false,
        inspect_response: true,
    },
    Case {
        name: "request bodies only",
        repeat: 7,
        delay: Duration::ZERO,
        hybrid: false,
        inspect_response: false,
    },
    Case {
        name: "hybrid job trigger",
        repeat: 4,
        delay: Duration::ZERO,
        hybrid: true,
        inspect_response: true,
    },
];

impl Case {
    fn captures(&self) -> usize {
        self.repeat * if self.inspect_response { 2 } else { 1 }
    }

    fn method(&self) -> CaptureMethod {
        if self.hybrid {
            CaptureMethod::HybridInspectJobTrigger
        } else {
            CaptureMethod::InspectContent
        }
    }

    fn mode(&self) -> InspectMode {
        if self.hybrid {
            InspectMode::Hybrid {
                trigger: TRIGGER.to_string(),
            }
        } else {
            InspectMode::Content {
                parent: PARENT.to_string(),
                template: TEMPLATE.to_string(),
            }
        }
    }

    fn template(&self, body: &str) -> CaptureTemplate {
        if self.hybrid {
            CaptureTemplate::new(body.to_string(), TRIGGER, "")
        } else {
            CaptureTemplate::new(body.to_string(), PARENT, TEMPLATE)
        }
    }

    /// The scenario with `verify_captures` expected captures.
    fn scenario(&self, verify_captures: usize) -> Scenario {
        let body = ssn_body();
        let mut proxy = StartStandInProxy::new(self.mode());
        if !self.inspect_response {
            proxy = proxy.requests_only();
        }

        Scenario::new(self.name)
            .step(
                StartFakeDlp::new()
                    .ephemeral()
                    .delay(self.delay)
                    .queue_capacity(self.captures().max(1) * 2),
            )
            .step(proxy)
            .step(HttpCall::post("/logging?grpc=trace").admin())
            .step(HttpCall::post("/logging?wasm=debug").admin())
            .step(Repeat::new(
                self.repeat,
                HttpCall::post("/echo")
                    .body(body.clone())
                    .expect_body(body.clone())
                    .expect_header(INSPECTED_HEADER, HeaderMatch::AnyNonEmpty)
                    .expect_header("x-dlp-blocked", HeaderMatch::MustBeAbsent),
            ))
            .step(
                CaptureVerify::new(self.method(), verify_captures, self.template(&body))
                    .timeout(Duration::from_secs(2)),
            )
            .step(
                StatsVerify::new()
                    .config(StatsConfig {
                        timeout: Duration::from_secs(2),
                        interval: Duration::from_millis(50),
                    })
                    .expect(TemplateStat::new(INSPECTED_STAT, "{{inspections}}")),
            )
    }

    fn params(&self) -> Params {
        Params::default().with_var("inspections", self.captures())
    }
}

#[tokio::test]
async fn scenarios_pass() {
    init_tracing();
    for case in CASES {
        let mut scenario = case.scenario(case.captures());
        let result = scenario.run(&mut case.params()).await;
        assert!(result.is_ok(), "case {:?} failed: {:?}", case.name, result);
    }
}

#[tokio::test]
async fn rerun_against_fresh_harness_gives_same_verdict() {
    init_tracing();
    let case = CASES[1];
    for _ in 0..2 {
        let mut scenario = case.scenario(case.captures());
        scenario.run(&mut case.params()).await.unwrap();
    }
}

#[tokio::test]
async fn missing_captures_time_out_with_partial_count() {
    init_tracing();
    // Only requests are inspected, but both directions are expected.
    let case = CASES[3];
    let expected = case.repeat * 2;
    let mut scenario = case.scenario(expected);

    let err = scenario.run(&mut case.params()).await.unwrap_err();
    assert!(err.is_timeout(), "unexpected error: {err}");
    match err {
        E2eError::Step { index, source, .. } => {
            assert_eq!(index, 5);
            match *source {
                E2eError::CaptureTimeout {
                    expected: want,
                    received,
                    ..
                } => {
                    assert_eq!(want, expected);
                    assert_eq!(received, case.repeat);
                }
                other => panic!("unexpected source: {other}"),
            }
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn wrong_stat_reports_last_value() {
    init_tracing();
    let case = CASES[0];
    let mut scenario = case.scenario(case.captures());
    let mut params = Params::default().with_var("inspections", 99);

    let err = scenario.run(&mut params).await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains(INSPECTED_STAT), "{message}");
    assert!(message.contains("last observed 2"), "{message}");
}

#[tokio::test]
async fn failed_scenario_releases_its_ports() {
    init_tracing();
    let case = CASES[3];
    let mut scenario = case.scenario(case.repeat + 1);
    let mut params = case.params();

    assert!(scenario.run(&mut params).await.is_err());

    let dlp = params.fake("dlp").unwrap().addr();
    let listener = params.ports.listener;
    let admin = params.ports.admin;
    TcpListener::bind(dlp).await.unwrap();
    TcpListener::bind(("127.0.0.1", listener)).await.unwrap();
    TcpListener::bind(("127.0.0.1", admin)).await.unwrap();
}

#[tokio::test]
async fn probe_mismatch_names_the_step() {
    init_tracing();
    let case = CASES[0];
    let mut scenario = Scenario::new("bad probe")
        .step(StartFakeDlp::new().ephemeral())
        .step(StartStandInProxy::new(case.mode()))
        .step(
            HttpCall::post("/echo")
                .body("abc")
                .expect_header(INSPECTED_HEADER, HeaderMatch::MustBeAbsent),
        );

    let err = scenario.run(&mut Params::default()).await.unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("step 2 (http POST /echo) failed"), "{message}");
    assert!(message.contains(INSPECTED_HEADER), "{message}");
}
