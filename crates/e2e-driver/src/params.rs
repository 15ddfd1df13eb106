//! Values shared by the steps of one scenario run.

use std::collections::HashMap;
use std::net::SocketAddr;

use e2e_core::{CaptureMethod, CaptureQueue, E2eError, E2eResult};

/// Default first port of a scenario's port range.
pub const DEFAULT_BASE_PORT: u16 = 20000;

/// Ports used by one scenario, allocated from a base port.
///
/// Scenarios running side by side get disjoint ranges by using base ports
/// at least [`Ports::SPAN`] apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ports {
    /// Proxy admin endpoint (stats, logging).
    pub admin: u16,
    /// Proxy listener receiving probe traffic.
    pub listener: u16,
    /// Backend the proxy routes to.
    pub backend: u16,
    /// Fake DLP service.
    pub dlp: u16,
    /// Control plane serving proxy configuration.
    pub control_plane: u16,
}

impl Ports {
    /// Number of ports a scenario reserves.
    pub const SPAN: u16 = 5;

    /// Highest base port whose whole range fits below 65536.
    pub const MAX_BASE: u16 = u16::MAX - (Self::SPAN - 1);

    /// Allocate consecutive ports starting at `base`.
    ///
    /// Fails when the range would run past port 65535.
    pub fn from_base(base: u16) -> E2eResult<Self> {
        if base > Self::MAX_BASE {
            return Err(E2eError::Configuration(format!(
                "base port {base} leaves no room for {} ports (max {})",
                Self::SPAN,
                Self::MAX_BASE
            )));
        }
        Ok(Self::consecutive(base))
    }

    const fn consecutive(base: u16) -> Self {
        Self {
            admin: base,
            listener: base + 1,
            backend: base + 2,
            dlp: base + 3,
            control_plane: base + 4,
        }
    }
}

impl Default for Ports {
    fn default() -> Self {
        Self::consecutive(DEFAULT_BASE_PORT)
    }
}

/// A running fake DLP server as seen by later steps.
#[derive(Debug, Clone)]
pub struct FakeDlpHandle {
    addr: SocketAddr,
    queues: HashMap<CaptureMethod, CaptureQueue>,
}

impl FakeDlpHandle {
    /// Create a handle from the server address and its capture queues.
    pub fn new(addr: SocketAddr, queues: impl IntoIterator<Item = CaptureQueue>) -> Self {
        Self {
            addr,
            queues: queues.into_iter().map(|q| (q.method(), q)).collect(),
        }
    }

    /// The bound address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The capture queue for `method`.
    pub fn queue(&self, method: CaptureMethod) -> E2eResult<&CaptureQueue> {
        self.queues.get(&method).ok_or_else(|| {
            E2eError::Configuration(format!("fake DLP at {} does not capture {}", self.addr, method))
        })
    }
}

/// Mutable context handed to every step of a scenario.
#[derive(Debug, Clone, Default)]
pub struct Params {
    /// Port allocation.
    pub ports: Ports,
    /// Free-form values for `{{name}}` placeholders.
    pub vars: HashMap<String, String>,
    fakes: HashMap<String, FakeDlpHandle>,
}

impl Params {
    /// Create parameters for the given ports.
    ///
    /// Each port is also available as a variable: `admin_port`,
    /// `listener_port`, `backend_port`, `dlp_port`, `control_plane_port`.
    pub fn new(ports: Ports) -> Self {
        let vars = [
            ("admin_port", ports.admin),
            ("listener_port", ports.listener),
            ("backend_port", ports.backend),
            ("dlp_port", ports.dlp),
            ("control_plane_port", ports.control_plane),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            ports,
            vars,
            fakes: HashMap::new(),
        }
    }

    /// Set a variable, returning `self` for chaining.
    pub fn with_var(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.set_var(name, value);
        self
    }

    /// Set a variable.
    pub fn set_var(&mut self, name: impl Into<String>, value: impl ToString) {
        self.vars.insert(name.into(), value.to_string());
    }

    /// Register a started fake DLP server under `name`, replacing any earlier one.
    pub fn register_fake(&mut self, name: impl Into<String>, handle: FakeDlpHandle) {
        self.fakes.insert(name.into(), handle);
    }

    /// Look up a fake DLP server started by an earlier step.
    pub fn fake(&self, name: &str) -> E2eResult<&FakeDlpHandle> {
        self.fakes
            .get(name)
            .ok_or_else(|| E2eError::Configuration(format!("no fake DLP server named {name:?}")))
    }

    /// Replace every `{{name}}` in `template` with its variable.
    ///
    /// Whitespace inside the braces is ignored. An unknown name or an
    /// unterminated placeholder is a configuration error.
    pub fn fill(&self, template: &str) -> E2eResult<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| {
                E2eError::Configuration(format!("unterminated placeholder in {template:?}"))
            })?;
            let name = after[..end].trim();
            let value = self.vars.get(name).ok_or_else(|| {
                E2eError::Configuration(format!("undefined variable {name:?}"))
            })?;
            out.push_str(value);
            rest = &after[end + 2..];
        }

        out.push_str(rest);
        Ok(out)
    }
}
