//! Builder for configuring and starting the fake DLP server.

use std::net::SocketAddr;
use std::time::Duration;

use e2e_core::{E2eError, E2eResult};

use crate::config::FakeDlpConfig;
use crate::FakeDlp;

/// Builder for a [`FakeDlp`] server.
///
/// # Example
///
/// ```rust,ignore
/// use fake_dlp::FakeDlpBuilder;
/// use std::time::Duration;
///
/// let fake = FakeDlpBuilder::new()
///     .port(12312)
///     .delay(Duration::from_millis(10))
///     .queue_capacity(200)
///     .start()
///     .await?;
/// ```
#[derive(Debug, Default)]
pub struct FakeDlpBuilder {
    addr: Option<SocketAddr>,
    delay: Option<Duration>,
    queue_capacity: Option<usize>,
    disable_health: bool,
    shutdown_grace: Option<Duration>,
    max_message_size: Option<usize>,
}

impl FakeDlpBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen on the given address.
    pub fn addr(mut self, addr: SocketAddr) -> Self {
        self.addr = Some(addr);
        self
    }

    /// Listen on `127.0.0.1:port`.
    pub fn port(mut self, port: u16) -> Self {
        self.addr = Some(SocketAddr::from(([127, 0, 0, 1], port)));
        self
    }

    /// Listen on an ephemeral loopback port.
    pub fn ephemeral(self) -> Self {
        self.port(0)
    }

    /// Set the artificial latency of instrumented calls.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Set the capacity of each capture queue.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Do not register the gRPC health service.
    pub fn disable_health(mut self) -> Self {
        self.disable_health = true;
        self
    }

    /// Set how long `stop` waits for in-flight calls.
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = Some(grace);
        self
    }

    /// Set the maximum message size in bytes.
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = Some(size);
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue capacity or the message size is zero.
    pub fn build(self) -> E2eResult<FakeDlpConfig> {
        let defaults = FakeDlpConfig::default();

        let queue_capacity = self.queue_capacity.unwrap_or(defaults.queue_capacity);
        if queue_capacity == 0 {
            return Err(E2eError::Configuration(
                "queue capacity must be positive".into(),
            ));
        }

        let max_message_size = self.max_message_size.unwrap_or(defaults.max_message_size);
        if max_message_size == 0 {
            return Err(E2eError::Configuration(
                "max message size must be positive".into(),
            ));
        }

        Ok(FakeDlpConfig {
            addr: self.addr.unwrap_or(defaults.addr),
            delay: self.delay.unwrap_or(defaults.delay),
            queue_capacity,
            enable_health: !self.disable_health,
            shutdown_grace: self.shutdown_grace.unwrap_or(defaults.shutdown_grace),
            max_message_size,
        })
    }

    /// Build the configuration and start the server.
    pub async fn start(self) -> E2eResult<FakeDlp> {
        FakeDlp::start(self.build()?).await
    }
}
