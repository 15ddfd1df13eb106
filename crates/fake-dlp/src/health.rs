//! gRPC health reporting for the fake DLP server.
//!
//! Proxies that health-check their gRPC upstreams use the standard
//! `grpc.health.v1.Health` protocol; the fake reports the DLP service as
//! serving while it accepts calls.

use std::sync::Arc;
use tokio::sync::Mutex;

use tonic_health::pb::health_server::{Health, HealthServer};
use tonic_health::server::HealthReporter;
use tonic_health::ServingStatus;

/// Health status handle for the fake DLP server.
#[derive(Clone)]
pub struct HealthService {
    reporter: Arc<Mutex<HealthReporter>>,
}

impl std::fmt::Debug for HealthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthService").finish()
    }
}

impl HealthService {
    /// Create the status handle and the tonic service to register.
    pub fn new() -> (Self, HealthServer<impl Health>) {
        let (reporter, service) = tonic_health::server::health_reporter();
        let wrapper = Self {
            reporter: Arc::new(Mutex::new(reporter)),
        };
        (wrapper, service)
    }

    /// Mark the DLP service as serving.
    pub async fn set_serving(&self) {
        self.set_status(ServingStatus::Serving).await;
    }

    /// Mark the DLP service as not serving.
    pub async fn set_not_serving(&self) {
        self.set_status(ServingStatus::NotServing).await;
    }

    async fn set_status(&self, status: ServingStatus) {
        let mut reporter = self.reporter.lock().await;
        for service in Self::service_names() {
            reporter.set_service_status(service, status).await;
        }
    }

    /// Names reported through the health protocol.
    ///
    /// The empty name is the overall server status.
    #[inline]
    pub const fn service_names() -> &'static [&'static str] {
        &["", dlp_types::DLP_SERVICE]
    }
}
