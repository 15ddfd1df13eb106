//! Fake DLP server configuration.

use std::net::SocketAddr;
use std::time::Duration;

use e2e_core::DEFAULT_QUEUE_CAPACITY;

/// Port the proxy's DLP filter is configured to call.
pub const DEFAULT_DLP_PORT: u16 = 12312;

/// Configuration for the fake DLP server.
#[derive(Debug, Clone)]
pub struct FakeDlpConfig {
    /// Address to listen on. Port 0 binds an ephemeral port.
    pub addr: SocketAddr,
    /// Artificial latency added to every instrumented call.
    pub delay: Duration,
    /// Capacity of each capture queue.
    ///
    /// Must cover every capture a scenario can produce before its verifier
    /// starts draining; handlers wait for space once it is reached.
    pub queue_capacity: usize,
    /// Register the gRPC health service.
    pub enable_health: bool,
    /// Time `stop` waits for in-flight calls before aborting the server.
    pub shutdown_grace: Duration,
    /// Maximum decoded or encoded message size in bytes.
    pub max_message_size: usize,
}

impl Default for FakeDlpConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_DLP_PORT)),
            delay: Duration::ZERO,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            enable_health: true,
            shutdown_grace: Duration::from_secs(5),
            max_message_size: 4 * 1024 * 1024, // 4MB
        }
    }
}
