//! An in-process stand-in for a proxy running the DLP filter.
//!
//! `POST /echo` on the listener port sends the request body to DLP, echoes
//! it back and, when response inspection is on, sends the response body to
//! DLP too. The admin port serves `/stats/prometheus` with the
//! `envoy_dlp_stat_inspected` counter, `/ready` and `POST /logging`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use dlp_e2e::prelude::*;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Name of the counter the stand-in exposes.
pub const INSPECTED_STAT: &str = "envoy_dlp_stat_inspected";

/// Header set on responses whose body was inspected.
pub const INSPECTED_HEADER: &str = "x-dlp-inspected";

/// Which DLP call the stand-in makes per body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InspectMode {
    /// `InspectContent` with a parent and a template name.
    Content {
        /// Resource parent.
        parent: String,
        /// Inspect template name.
        template: String,
    },
    /// `HybridInspectJobTrigger` against a job trigger.
    Hybrid {
        /// Job trigger resource name.
        trigger: String,
    },
}

/// Stand-in proxy configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// DLP endpoint, e.g. `http://127.0.0.1:12312`.
    pub dlp_endpoint: String,
    /// DLP call to make.
    pub mode: InspectMode,
    /// Also inspect response bodies.
    pub inspect_response: bool,
}

#[derive(Clone)]
struct AppState {
    client: DlpClient,
    mode: InspectMode,
    inspect_response: bool,
    inspected: Arc<AtomicU64>,
}

impl AppState {
    async fn inspect(&self, body: Bytes) -> Result<(), StatusCode> {
        let mut client = self.client.clone();
        let result = match &self.mode {
            InspectMode::Content { parent, template } => client
                .inspect_content(parent.clone(), template.clone(), body)
                .await
                .map(drop),
            InspectMode::Hybrid { trigger } => client
                .hybrid_inspect_job_trigger(trigger.clone(), body)
                .await
                .map(drop),
        };
        match result {
            Ok(()) => {
                self.inspected.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "inspection failed");
                Err(StatusCode::BAD_GATEWAY)
            }
        }
    }
}

async fn echo(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse, StatusCode> {
    state.inspect(body.clone()).await?;
    if state.inspect_response {
        state.inspect(body.clone()).await?;
    }
    debug!(bytes = body.len(), "echo");
    Ok(([(INSPECTED_HEADER, "true")], body))
}

async fn stats(State(state): State<AppState>) -> String {
    let n = state.inspected.load(Ordering::SeqCst);
    format!("# TYPE {INSPECTED_STAT} counter\n{INSPECTED_STAT}{{}} {n}\n")
}

/// A running stand-in proxy.
#[derive(Debug)]
pub struct StandInProxy {
    listener_addr: SocketAddr,
    admin_addr: SocketAddr,
    inspected: Arc<AtomicU64>,
    stop_tx: Vec<oneshot::Sender<()>>,
    handles: Vec<JoinHandle<std::io::Result<()>>>,
}

impl StandInProxy {
    /// Connect to DLP and serve on the given listener and admin addresses.
    pub async fn start(
        config: ProxyConfig,
        listener_addr: SocketAddr,
        admin_addr: SocketAddr,
    ) -> anyhow::Result<Self> {
        let client = DlpClient::connect(config.dlp_endpoint.clone())
            .await
            .with_context(|| format!("connecting to DLP at {}", config.dlp_endpoint))?;
        let inspected = Arc::new(AtomicU64::new(0));
        let state = AppState {
            client,
            mode: config.mode,
            inspect_response: config.inspect_response,
            inspected: Arc::clone(&inspected),
        };

        let traffic = Router::new()
            .route("/echo", post(echo))
            .with_state(state.clone());
        let admin = Router::new()
            .route("/stats/prometheus", get(stats))
            .route("/ready", get(|| async { "LIVE" }))
            .route("/logging", post(|| async { "active loggers updated" }))
            .with_state(state);

        let traffic_listener = TcpListener::bind(listener_addr)
            .await
            .with_context(|| format!("binding listener {listener_addr}"))?;
        let admin_listener = TcpListener::bind(admin_addr)
            .await
            .with_context(|| format!("binding admin {admin_addr}"))?;

        let mut proxy = Self {
            listener_addr: traffic_listener.local_addr()?,
            admin_addr: admin_listener.local_addr()?,
            inspected,
            stop_tx: Vec::new(),
            handles: Vec::new(),
        };
        proxy.spawn(traffic_listener, traffic);
        proxy.spawn(admin_listener, admin);

        info!(
            listener = %proxy.listener_addr,
            admin = %proxy.admin_addr,
            "stand-in proxy started"
        );
        Ok(proxy)
    }

    fn spawn(&mut self, listener: TcpListener, app: Router) {
        let (tx, rx) = oneshot::channel::<()>();
        self.stop_tx.push(tx);
        self.handles.push(tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = rx.await;
                })
                .await
        }));
    }

    /// Bound listener address.
    pub fn listener_addr(&self) -> SocketAddr {
        self.listener_addr
    }

    /// Bound admin address.
    pub fn admin_addr(&self) -> SocketAddr {
        self.admin_addr
    }

    /// Bodies inspected so far.
    pub fn inspected(&self) -> u64 {
        self.inspected.load(Ordering::SeqCst)
    }

    /// Stop both servers.
    pub async fn stop(&mut self) {
        for tx in self.stop_tx.drain(..) {
            let _ = tx.send(());
        }
        for handle in self.handles.drain(..) {
            let _ = tokio::time::timeout(std::time::Duration::from_secs(5), handle).await;
        }
        info!("stand-in proxy stopped");
    }
}

/// Scenario step starting a [`StandInProxy`] on ephemeral ports.
///
/// Talks to the fake DLP server at `dlp_port` and publishes the bound ports
/// into the scenario's [`Ports`] and variables.
#[derive(Debug)]
pub struct StartStandInProxy {
    mode: InspectMode,
    inspect_response: bool,
    proxy: Option<StandInProxy>,
}

impl StartStandInProxy {
    /// Inspect requests and responses with the given call.
    pub fn new(mode: InspectMode) -> Self {
        Self {
            mode,
            inspect_response: true,
            proxy: None,
        }
    }

    /// Inspect request bodies only.
    pub fn requests_only(mut self) -> Self {
        self.inspect_response = false;
        self
    }
}

#[async_trait]
impl Step for StartStandInProxy {
    fn name(&self) -> String {
        "start stand-in proxy".to_string()
    }

    async fn run(&mut self, params: &mut Params) -> E2eResult<()> {
        let dlp_endpoint = params.fill("http://127.0.0.1:{{dlp_port}}")?;
        let config = ProxyConfig {
            dlp_endpoint,
            mode: self.mode.clone(),
            inspect_response: self.inspect_response,
        };
        let loopback = SocketAddr::from(([127, 0, 0, 1], 0));
        let proxy = StandInProxy::start(config, loopback, loopback)
            .await
            .map_err(|e| E2eError::process("stand-in proxy", format!("{e:#}")))?;

        params.ports.listener = proxy.listener_addr().port();
        params.ports.admin = proxy.admin_addr().port();
        params.set_var("listener_port", params.ports.listener);
        params.set_var("admin_port", params.ports.admin);
        self.proxy = Some(proxy);
        Ok(())
    }

    async fn cleanup(&mut self) -> E2eResult<()> {
        if let Some(mut proxy) = self.proxy.take() {
            proxy.stop().await;
        }
        Ok(())
    }
}
