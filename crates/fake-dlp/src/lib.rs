//! # fake-dlp
//!
//! A fake Cloud DLP v2 gRPC server for end-to-end tests of the DLP proxy
//! filter.
//!
//! The server answers the complete `google.privacy.dlp.v2.DlpService` method
//! set. Two methods are instrumented:
//!
//! - `InspectContent`
//! - `HybridInspectJobTrigger`
//!
//! Each instrumented call pushes a [`CapturedRequest`] onto the method's
//! [`CaptureQueue`], sleeps for the configured delay and returns an empty
//! response. Every other method returns the empty message immediately.
//!
//! ## Example
//!
//! ```rust,ignore
//! use fake_dlp::FakeDlp;
//! use e2e_core::CaptureMethod;
//!
//! let mut fake = FakeDlp::builder().ephemeral().start().await?;
//! let queue = fake.queue(CaptureMethod::InspectContent).unwrap().clone();
//!
//! // ... drive traffic through the proxy ...
//!
//! fake.stop().await;
//! ```
//!
//! ## Lifecycle
//!
//! The listener is bound inside [`FakeDlp::start`], so a bind failure is
//! returned to the caller instead of surfacing later from the serve task.
//! [`FakeDlp::stop`] marks the service not serving, releases handlers that
//! are waiting on a full queue, waits for in-flight calls for the grace
//! period and then stops the server, aborting it if it does not finish.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod client;
mod config;
pub mod health;
pub mod metrics;
pub mod service;
pub mod shutdown;

pub use builder::FakeDlpBuilder;
pub use client::DlpClient;
pub use config::{FakeDlpConfig, DEFAULT_DLP_PORT};
pub use health::HealthService;
pub use metrics::HarnessMetrics;
pub use service::{DlpService, DlpServiceServer, FakeDlpService};
pub use shutdown::ShutdownController;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use e2e_core::{CaptureMethod, CaptureQueue, CapturedRequest, E2eError, E2eResult};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tracing::{info, warn};

/// A running fake DLP server.
#[derive(Debug)]
pub struct FakeDlp {
    config: FakeDlpConfig,
    local_addr: SocketAddr,
    queues: Arc<HashMap<CaptureMethod, CaptureQueue>>,
    metrics: HarnessMetrics,
    shutdown: ShutdownController,
    health: Option<HealthService>,
    stop_tx: Option<oneshot::Sender<()>>,
    server_handle: Option<JoinHandle<Result<(), tonic::transport::Error>>>,
}

impl FakeDlp {
    /// Create a new builder for configuring the server.
    pub fn builder() -> FakeDlpBuilder {
        FakeDlpBuilder::new()
    }

    /// Bind the listener and start serving in the background.
    ///
    /// # Errors
    ///
    /// Returns [`E2eError::Bind`] if the address cannot be bound and a
    /// configuration error if the queue capacity is zero.
    pub async fn start(config: FakeDlpConfig) -> E2eResult<Self> {
        let queues = CaptureMethod::ALL
            .into_iter()
            .map(|method| Ok((method, CaptureQueue::new(method, config.queue_capacity)?)))
            .collect::<E2eResult<HashMap<_, _>>>()?;
        let queues = Arc::new(queues);

        let listener = TcpListener::bind(config.addr)
            .await
            .map_err(|source| E2eError::Bind {
                addr: config.addr,
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let metrics = HarnessMetrics::new();
        let shutdown = ShutdownController::new();
        let service = FakeDlpService::new(
            config.delay,
            Arc::clone(&queues),
            shutdown.clone(),
            metrics.clone(),
        );

        let (health, health_svc) = if config.enable_health {
            let (health, health_svc) = HealthService::new();
            health.set_serving().await;
            (Some(health), Some(health_svc))
        } else {
            (None, None)
        };

        let router = Server::builder()
            .add_service(DlpServiceServer::new(service).max_message_size(config.max_message_size))
            .add_optional_service(health_svc);

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let incoming = TcpListenerStream::new(listener);
        let handle = tokio::spawn(async move {
            router
                .serve_with_incoming_shutdown(incoming, async move {
                    let _ = stop_rx.await;
                })
                .await
        });

        info!(
            addr = %local_addr,
            delay = ?config.delay,
            queue_capacity = config.queue_capacity,
            "fake DLP server listening"
        );

        Ok(Self {
            config,
            local_addr,
            queues,
            metrics,
            shutdown,
            health,
            stop_tx: Some(stop_tx),
            server_handle: Some(handle),
        })
    }

    /// The bound address.
    #[inline]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The bound port.
    #[inline]
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// URL for gRPC clients, e.g. `http://127.0.0.1:12312`.
    pub fn endpoint(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// The configuration the server was started with.
    #[inline]
    pub fn config(&self) -> &FakeDlpConfig {
        &self.config
    }

    /// Call metrics.
    #[inline]
    pub fn metrics(&self) -> &HarnessMetrics {
        &self.metrics
    }

    /// The capture queue of an instrumented method.
    pub fn queue(&self, method: CaptureMethod) -> Option<&CaptureQueue> {
        self.queues.get(&method)
    }

    /// Take every capture currently queued for `method`.
    pub async fn drain(&self, method: CaptureMethod) -> Vec<CapturedRequest> {
        match self.queues.get(&method) {
            Some(queue) => queue.drain().await,
            None => Vec::new(),
        }
    }

    /// Whether [`stop`](Self::stop) has already run.
    pub fn is_stopped(&self) -> bool {
        self.server_handle.is_none()
    }

    /// Stop the server.
    ///
    /// Safe to call more than once. Unread captures stay in their queues.
    pub async fn stop(&mut self) {
        let Some(mut handle) = self.server_handle.take() else {
            return;
        };

        if let Some(health) = &self.health {
            health.set_not_serving().await;
        }

        let grace = self.config.shutdown_grace;
        self.shutdown.shutdown(grace).await;

        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }

        match tokio::time::timeout(grace, &mut handle).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!(error = %e, "fake DLP server terminated abnormally"),
            Ok(Err(e)) => warn!(error = %e, "fake DLP server task failed"),
            Err(_) => {
                warn!(grace = ?grace, "fake DLP server did not stop in time, aborting");
                handle.abort();
            }
        }

        info!(
            addr = %self.local_addr,
            calls = self.metrics.calls(),
            captures = self.metrics.captures(),
            "fake DLP server stopped"
        );
    }
}

impl Drop for FakeDlp {
    fn drop(&mut self) {
        self.shutdown.trigger();
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}
