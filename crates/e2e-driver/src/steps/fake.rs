use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use e2e_core::{CaptureMethod, E2eResult};
use fake_dlp::{FakeDlp, FakeDlpConfig};
use tracing::info;

use crate::params::{FakeDlpHandle, Params};
use crate::step::Step;

/// Name a fake DLP server is registered under unless told otherwise.
pub const DEFAULT_FAKE_NAME: &str = "dlp";

/// Start a fake DLP server and register it in the scenario parameters.
///
/// Listens on the scenario's DLP port unless an address is set. The bound
/// port is published as the `dlp_port` variable. Cleanup stops the server;
/// captures nobody read are dropped with it. The registered handle stays in
/// the parameters so a failed run can still report where the server was;
/// the next run replaces it.
#[derive(Debug)]
pub struct StartFakeDlp {
    name: String,
    config: FakeDlpConfig,
    addr: Option<SocketAddr>,
    fake: Option<FakeDlp>,
}

impl StartFakeDlp {
    /// Start a server with default settings.
    pub fn new() -> Self {
        Self::with_config(FakeDlpConfig::default())
    }

    /// Start a server from a full configuration; its address is replaced by
    /// the scenario's DLP port unless [`addr`](Self::addr) is also set.
    pub fn with_config(config: FakeDlpConfig) -> Self {
        Self {
            name: DEFAULT_FAKE_NAME.to_string(),
            config,
            addr: None,
            fake: None,
        }
    }

    /// Register under another name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Listen on a fixed address.
    pub fn addr(mut self, addr: SocketAddr) -> Self {
        self.addr = Some(addr);
        self
    }

    /// Listen on an ephemeral loopback port.
    pub fn ephemeral(self) -> Self {
        self.addr(SocketAddr::from(([127, 0, 0, 1], 0)))
    }

    /// Artificial latency of instrumented calls.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.config.delay = delay;
        self
    }

    /// Capacity of each capture queue.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }
}

impl Default for StartFakeDlp {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Step for StartFakeDlp {
    fn name(&self) -> String {
        format!("start fake DLP {:?}", self.name)
    }

    async fn run(&mut self, params: &mut Params) -> E2eResult<()> {
        let mut config = self.config.clone();
        config.addr = self
            .addr
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], params.ports.dlp)));

        let fake = FakeDlp::start(config).await?;
        let queues = CaptureMethod::ALL
            .into_iter()
            .filter_map(|method| fake.queue(method).cloned());
        params.register_fake(&self.name, FakeDlpHandle::new(fake.local_addr(), queues));
        params.set_var("dlp_port", fake.port());

        info!(name = %self.name, addr = %fake.local_addr(), "fake DLP started");
        self.fake = Some(fake);
        Ok(())
    }

    async fn cleanup(&mut self) -> E2eResult<()> {
        if let Some(mut fake) = self.fake.take() {
            fake.stop().await;
        }
        Ok(())
    }
}
