//! Minimal typed client for the DLP v2 service.
//!
//! Used by stand-in proxies in tests and for probing the fake directly.

use dlp_types::{
    ContentItem, HybridContentItem, HybridInspectJobTriggerRequest, HybridInspectResponse, Inert,
    InspectContentRequest, InspectContentResponse,
};
use e2e_core::{E2eError, E2eResult};
use http::uri::PathAndQuery;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::transport::{Channel, Endpoint};

/// Client for `google.privacy.dlp.v2.DlpService`.
#[derive(Debug, Clone)]
pub struct DlpClient {
    inner: Grpc<Channel>,
}

impl DlpClient {
    /// Connect to a DLP endpoint such as `http://127.0.0.1:12312`.
    pub async fn connect(endpoint: impl Into<String>) -> E2eResult<Self> {
        let channel = Endpoint::from_shared(endpoint.into())
            .map_err(|e| E2eError::transport("invalid DLP endpoint", e))?
            .connect()
            .await
            .map_err(|e| E2eError::transport("failed to connect to DLP", e))?;
        Ok(Self {
            inner: Grpc::new(channel),
        })
    }

    /// Call `InspectContent` with a byte payload.
    pub async fn inspect_content(
        &mut self,
        parent: impl Into<String>,
        template_name: impl Into<String>,
        payload: impl Into<bytes::Bytes>,
    ) -> E2eResult<InspectContentResponse> {
        let request = InspectContentRequest {
            parent: parent.into(),
            item: Some(ContentItem::text_bytes(payload)),
            inspect_template_name: template_name.into(),
            location_id: String::new(),
        };
        self.unary("InspectContent", request).await
    }

    /// Call `HybridInspectJobTrigger` with a byte payload.
    pub async fn hybrid_inspect_job_trigger(
        &mut self,
        name: impl Into<String>,
        payload: impl Into<bytes::Bytes>,
    ) -> E2eResult<HybridInspectResponse> {
        let request = HybridInspectJobTriggerRequest {
            name: name.into(),
            hybrid_item: Some(HybridContentItem {
                item: Some(ContentItem::text_bytes(payload)),
            }),
        };
        self.unary("HybridInspectJobTrigger", request).await
    }

    /// Call any DLP method with an empty request, discarding the response.
    pub async fn call_empty(&mut self, method: &str) -> E2eResult<()> {
        self.unary::<Inert, Inert>(method, Inert {}).await?;
        Ok(())
    }

    async fn unary<Req, Resp>(&mut self, method: &str, request: Req) -> E2eResult<Resp>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        self.inner
            .ready()
            .await
            .map_err(|e| E2eError::transport("DLP service was not ready", e))?;

        let path: PathAndQuery = dlp_types::method_path(method)
            .parse()
            .map_err(|e| E2eError::Configuration(format!("invalid method {method}: {e}")))?;
        let codec = ProstCodec::<Req, Resp>::default();

        let response = self
            .inner
            .unary(tonic::Request::new(request), path, codec)
            .await?;
        Ok(response.into_inner())
    }
}
