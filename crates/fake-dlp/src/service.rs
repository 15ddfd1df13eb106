//! The fake `google.privacy.dlp.v2.DlpService`.
//!
//! Routing is one table lookup: a DLP method is either instrumented (its
//! request is captured, then answered after the configured delay) or inert
//! (answered at once with the empty message). Paths outside the DLP method
//! set get `UNIMPLEMENTED`, as a real server would.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use dlp_types::{
    ContentItem, HybridInspectJobTriggerRequest, HybridInspectResponse, Inert,
    InspectContentRequest, InspectContentResponse, DLP_METHODS, DLP_SERVICE,
};
use e2e_core::{CaptureMethod, CaptureQueue, CapturedRequest};
use tonic::body::BoxBody;
use tonic::codec::ProstCodec;
use tonic::codegen::BoxFuture;
use tonic::server::{Grpc, NamedService, UnaryService};
use tonic::{Request, Response, Status};
use tracing::{debug, instrument, warn};

use crate::metrics::HarnessMetrics;
use crate::shutdown::ShutdownController;

/// How a DLP method is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The call is captured.
    Instrumented(CaptureMethod),
    /// The call returns the empty message.
    Inert,
}

/// Resolve a request path against the DLP method table.
///
/// Returns `None` for paths that are not DLP methods.
pub fn route(path: &str) -> Option<Route> {
    let method = dlp_types::method_from_path(path)?;
    if !DLP_METHODS.contains(&method) {
        return None;
    }
    Some(CaptureMethod::from_name(method).map_or(Route::Inert, Route::Instrumented))
}

/// The DLP calls the fake answers.
#[async_trait]
pub trait DlpService: Send + Sync + 'static {
    /// `InspectContent`.
    async fn inspect_content(
        &self,
        request: Request<InspectContentRequest>,
    ) -> Result<Response<InspectContentResponse>, Status>;

    /// `HybridInspectJobTrigger`.
    async fn hybrid_inspect_job_trigger(
        &self,
        request: Request<HybridInspectJobTriggerRequest>,
    ) -> Result<Response<HybridInspectResponse>, Status>;

    /// Every other DLP method.
    async fn inert(&self, method: &str, request: Request<Inert>) -> Result<Response<Inert>, Status>;
}

/// Capturing implementation of [`DlpService`].
#[derive(Debug, Clone)]
pub struct FakeDlpService {
    delay: Duration,
    queues: Arc<HashMap<CaptureMethod, CaptureQueue>>,
    shutdown: ShutdownController,
    metrics: HarnessMetrics,
}

impl FakeDlpService {
    /// Create a new service writing captures to `queues`.
    pub fn new(
        delay: Duration,
        queues: Arc<HashMap<CaptureMethod, CaptureQueue>>,
        shutdown: ShutdownController,
        metrics: HarnessMetrics,
    ) -> Self {
        Self {
            delay,
            queues,
            shutdown,
            metrics,
        }
    }

    /// Queue a capture, then hold the call for the configured delay.
    async fn capture(&self, capture: CapturedRequest) {
        let _op = self.shutdown.register_operation();
        let method = capture.method();
        self.metrics.record_call(method.as_str());

        let Some(queue) = self.queues.get(&method) else {
            warn!(method = %method, "no capture queue for instrumented method");
            return;
        };

        let stopping = self.shutdown.shutdown_signal();
        tokio::select! {
            result = queue.push(capture) => match result {
                Ok(()) => {
                    self.metrics.record_capture(method, queue.len());
                    debug!(method = %method, queued = queue.len(), "captured request");
                }
                Err(e) => warn!(method = %method, error = %e, "capture lost"),
            },
            _ = stopping.wait() => {
                self.metrics.record_abandoned(method);
                warn!(method = %method, "server stopping, capture abandoned");
            }
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl DlpService for FakeDlpService {
    #[instrument(skip(self, request), name = "inspect_content")]
    async fn inspect_content(
        &self,
        request: Request<InspectContentRequest>,
    ) -> Result<Response<InspectContentResponse>, Status> {
        let request = request.into_inner();
        let payload = request
            .item
            .as_ref()
            .map(ContentItem::payload)
            .unwrap_or_default();

        self.capture(CapturedRequest::new(
            CaptureMethod::InspectContent,
            payload,
            request.parent,
            request.inspect_template_name,
        ))
        .await;

        Ok(Response::new(InspectContentResponse::default()))
    }

    #[instrument(skip(self, request), name = "hybrid_inspect_job_trigger")]
    async fn hybrid_inspect_job_trigger(
        &self,
        request: Request<HybridInspectJobTriggerRequest>,
    ) -> Result<Response<HybridInspectResponse>, Status> {
        let request = request.into_inner();
        let payload = request
            .hybrid_item
            .as_ref()
            .and_then(|hybrid| hybrid.item.as_ref())
            .map(ContentItem::payload)
            .unwrap_or_default();

        self.capture(CapturedRequest::new(
            CaptureMethod::HybridInspectJobTrigger,
            payload,
            request.name,
            "",
        ))
        .await;

        Ok(Response::new(HybridInspectResponse::default()))
    }

    async fn inert(&self, method: &str, _request: Request<Inert>) -> Result<Response<Inert>, Status> {
        self.metrics.record_call(method);
        debug!(method, "inert DLP call");
        Ok(Response::new(Inert {}))
    }
}

/// tonic service wrapper routing DLP paths to a [`DlpService`].
#[derive(Debug)]
pub struct DlpServiceServer<T> {
    inner: Arc<T>,
    max_message_size: Option<usize>,
}

impl<T> Clone for DlpServiceServer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            max_message_size: self.max_message_size,
        }
    }
}

impl<T: DlpService> DlpServiceServer<T> {
    /// Create a new server wrapper.
    pub fn new(service: T) -> Self {
        Self {
            inner: Arc::new(service),
            max_message_size: None,
        }
    }

    /// Limit decoded and encoded message sizes.
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = Some(size);
        self
    }

    fn grpc<Enc, Dec>(&self) -> Grpc<ProstCodec<Enc, Dec>>
    where
        Enc: prost::Message + Send + 'static,
        Dec: prost::Message + Default + Send + 'static,
    {
        Grpc::new(ProstCodec::default())
            .apply_max_message_size_config(self.max_message_size, self.max_message_size)
    }
}

struct InspectContentSvc<T>(Arc<T>);

impl<T: DlpService> UnaryService<InspectContentRequest> for InspectContentSvc<T> {
    type Response = InspectContentResponse;
    type Future = BoxFuture<Response<Self::Response>, Status>;

    fn call(&mut self, request: Request<InspectContentRequest>) -> Self::Future {
        let inner = Arc::clone(&self.0);
        Box::pin(async move { inner.inspect_content(request).await })
    }
}

struct HybridInspectJobTriggerSvc<T>(Arc<T>);

impl<T: DlpService> UnaryService<HybridInspectJobTriggerRequest> for HybridInspectJobTriggerSvc<T> {
    type Response = HybridInspectResponse;
    type Future = BoxFuture<Response<Self::Response>, Status>;

    fn call(&mut self, request: Request<HybridInspectJobTriggerRequest>) -> Self::Future {
        let inner = Arc::clone(&self.0);
        Box::pin(async move { inner.hybrid_inspect_job_trigger(request).await })
    }
}

struct InertSvc<T> {
    inner: Arc<T>,
    method: String,
}

impl<T: DlpService> UnaryService<Inert> for InertSvc<T> {
    type Response = Inert;
    type Future = BoxFuture<Response<Self::Response>, Status>;

    fn call(&mut self, request: Request<Inert>) -> Self::Future {
        let inner = Arc::clone(&self.inner);
        let method = self.method.clone();
        Box::pin(async move { inner.inert(&method, request).await })
    }
}

fn unimplemented_response() -> http::Response<BoxBody> {
    let mut response = http::Response::new(tonic::body::empty_body());
    let headers = response.headers_mut();
    headers.insert(
        http::HeaderName::from_static("grpc-status"),
        http::HeaderValue::from_static("12"),
    );
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/grpc"),
    );
    response
}

impl<T: DlpService> tonic::codegen::Service<http::Request<BoxBody>> for DlpServiceServer<T> {
    type Response = http::Response<BoxBody>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<BoxBody>) -> Self::Future {
        let inner = Arc::clone(&self.inner);
        match route(req.uri().path()) {
            Some(Route::Instrumented(CaptureMethod::InspectContent)) => {
                let mut grpc = self.grpc::<InspectContentResponse, InspectContentRequest>();
                Box::pin(async move { Ok(grpc.unary(InspectContentSvc(inner), req).await) })
            }
            Some(Route::Instrumented(CaptureMethod::HybridInspectJobTrigger)) => {
                let mut grpc = self.grpc::<HybridInspectResponse, HybridInspectJobTriggerRequest>();
                Box::pin(async move {
                    Ok(grpc.unary(HybridInspectJobTriggerSvc(inner), req).await)
                })
            }
            Some(Route::Inert) => {
                let method = dlp_types::method_from_path(req.uri().path())
                    .unwrap_or_default()
                    .to_string();
                let mut grpc = self.grpc::<Inert, Inert>();
                Box::pin(async move { Ok(grpc.unary(InertSvc { inner, method }, req).await) })
            }
            None => Box::pin(async move { Ok(unimplemented_response()) }),
        }
    }
}

impl<T> NamedService for DlpServiceServer<T> {
    const NAME: &'static str = DLP_SERVICE;
}
