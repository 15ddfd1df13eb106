//! Fake DLP server tests over real gRPC connections.

use std::time::Duration;

use dlp_e2e::prelude::*;
use dlp_e2e::types::{DLP_METHODS, DLP_SERVICE};
use tokio::time::Instant;
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;

use crate::init_tracing;

const PARENT: &str = "projects/test-project/locations/test-location";

#[tokio::test]
async fn answers_the_whole_surface() {
    init_tracing();
    let mut fake = FakeDlp::builder().ephemeral().start().await.unwrap();
    let mut client = DlpClient::connect(fake.endpoint()).await.unwrap();

    for method in DLP_METHODS {
        match CaptureMethod::from_name(method) {
            Some(CaptureMethod::InspectContent) => {
                client.inspect_content(PARENT, "t", "x").await.unwrap();
            }
            Some(CaptureMethod::HybridInspectJobTrigger) => {
                client.hybrid_inspect_job_trigger("trigger", "x").await.unwrap();
            }
            None => client.call_empty(method).await.unwrap(),
        }
    }

    assert_eq!(fake.drain(CaptureMethod::InspectContent).await.len(), 1);
    assert_eq!(fake.drain(CaptureMethod::HybridInspectJobTrigger).await.len(), 1);
    assert_eq!(fake.metrics().calls() as usize, DLP_METHODS.len());
    fake.stop().await;
}

#[tokio::test]
async fn large_payload_round_trips_byte_exact() {
    init_tracing();
    let mut fake = FakeDlp::builder().ephemeral().start().await.unwrap();
    let mut client = DlpClient::connect(fake.endpoint()).await.unwrap();

    let body = "Hi, this is my SSN: 987-65-4321.".repeat(1000);
    assert_eq!(body.len(), 32_000);
    client
        .inspect_content(PARENT, "test-template", body.clone())
        .await
        .unwrap();

    let got = fake
        .queue(CaptureMethod::InspectContent)
        .unwrap()
        .recv_until(Instant::now() + Duration::from_secs(1))
        .await
        .unwrap();
    CaptureTemplate::new(body, PARENT, "test-template")
        .check(&got)
        .unwrap();
    fake.stop().await;
}

#[tokio::test]
async fn concurrent_callers_are_each_captured_once() {
    init_tracing();
    let callers = 50;
    let mut fake = FakeDlp::builder()
        .ephemeral()
        .delay(Duration::from_millis(20))
        .start()
        .await
        .unwrap();
    let client = DlpClient::connect(fake.endpoint()).await.unwrap();

    let calls = (0..callers).map(|i| {
        let mut client = client.clone();
        async move { client.inspect_content(PARENT, "t", format!("caller-{i}")).await }
    });
    for result in futures::future::join_all(calls).await {
        result.unwrap();
    }

    let mut payloads: Vec<_> = fake
        .drain(CaptureMethod::InspectContent)
        .await
        .iter()
        .map(|c| String::from_utf8_lossy(c.payload()).into_owned())
        .collect();
    payloads.sort();
    payloads.dedup();
    assert_eq!(payloads.len(), callers);
    fake.stop().await;
}

#[tokio::test]
async fn health_reports_serving() {
    init_tracing();
    let mut fake = FakeDlp::builder().ephemeral().start().await.unwrap();
    let channel = tonic::transport::Endpoint::new(fake.endpoint())
        .unwrap()
        .connect()
        .await
        .unwrap();
    let mut health = HealthClient::new(channel);

    for service in ["", DLP_SERVICE] {
        let status = health
            .check(HealthCheckRequest {
                service: service.to_string(),
            })
            .await
            .unwrap()
            .into_inner()
            .status();
        assert_eq!(status, ServingStatus::Serving, "service {service:?}");
    }
    fake.stop().await;
}

#[tokio::test]
async fn unread_captures_do_not_block_stop() {
    init_tracing();
    let mut fake = FakeDlp::builder()
        .ephemeral()
        .queue_capacity(2)
        .shutdown_grace(Duration::from_millis(500))
        .start()
        .await
        .unwrap();
    let client = DlpClient::connect(fake.endpoint()).await.unwrap();

    let pending: Vec<_> = (0..5)
        .map(|_| {
            let mut client = client.clone();
            tokio::spawn(async move { client.inspect_content(PARENT, "t", "x").await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(200)).await;

    tokio::time::timeout(Duration::from_secs(5), fake.stop())
        .await
        .expect("stop must not deadlock");
    assert!(fake.metrics().abandoned() >= 1);
    for call in pending {
        let _ = call.await;
    }
}
