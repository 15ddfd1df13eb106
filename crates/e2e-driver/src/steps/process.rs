use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use e2e_core::{E2eError, E2eResult};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::params::Params;
use crate::step::Step;

const READY_POLL_INTERVAL: Duration = Duration::from_millis(500);
const KILL_TIMEOUT: Duration = Duration::from_secs(5);

/// Spawn an external process, such as the proxy under test.
///
/// Arguments, environment values and the readiness URL may contain
/// `{{var}}` placeholders. With a readiness URL the step polls it until it
/// answers 2xx, failing if the process exits first or the timeout passes.
/// Cleanup kills and reaps the process.
#[derive(Debug)]
pub struct StartProcess {
    program: String,
    args: Vec<String>,
    filled_args: Vec<String>,
    env: Vec<(String, String)>,
    ready_url: Option<String>,
    ready_timeout: Duration,
    quiet: bool,
    child: Option<Child>,
}

impl StartProcess {
    /// Run `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            filled_args: Vec::new(),
            env: Vec::new(),
            ready_url: None,
            ready_timeout: Duration::from_secs(30),
            quiet: false,
            child: None,
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Wait until `url` answers 2xx.
    pub fn ready_url(mut self, url: impl Into<String>) -> Self {
        self.ready_url = Some(url.into());
        self
    }

    /// How long to wait for readiness.
    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Discard the process's stdout and stderr.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Command line of the last run, with placeholders filled.
    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.filled_args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    async fn wait_ready(&mut self, url: &str) -> E2eResult<()> {
        let client = reqwest::Client::builder()
            .timeout(READY_POLL_INTERVAL.max(Duration::from_secs(1)))
            .build()?;
        let deadline = Instant::now() + self.ready_timeout;

        loop {
            if let Some(child) = self.child.as_mut() {
                if let Some(status) = child.try_wait()? {
                    return Err(E2eError::process(
                        self.command_line(),
                        format!("exited before becoming ready: {status}"),
                    ));
                }
            }

            match client.get(url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => debug!(url = %url, status = %resp.status(), "not ready"),
                Err(e) => debug!(url = %url, error = %e, "not ready"),
            }

            if Instant::now() >= deadline {
                return Err(E2eError::process(
                    self.command_line(),
                    format!("not ready at {url} after {:?}", self.ready_timeout),
                ));
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl Step for StartProcess {
    fn name(&self) -> String {
        format!("start {}", self.program)
    }

    async fn run(&mut self, params: &mut Params) -> E2eResult<()> {
        self.filled_args = self
            .args
            .iter()
            .map(|a| params.fill(a))
            .collect::<E2eResult<_>>()?;
        let mut command = Command::new(&self.program);
        command.args(&self.filled_args).kill_on_drop(true);
        for (key, value) in &self.env {
            command.env(key, params.fill(value)?);
        }
        if self.quiet {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let child = command
            .spawn()
            .map_err(|e| E2eError::process(self.command_line(), e.to_string()))?;
        info!(command = %self.command_line(), pid = child.id(), "process started");
        self.child = Some(child);

        if let Some(url) = &self.ready_url {
            let url = params.fill(url)?;
            self.wait_ready(&url).await?;
            info!(command = %self.program, url = %url, "process ready");
        }
        Ok(())
    }

    async fn cleanup(&mut self) -> E2eResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        if let Some(status) = child.try_wait()? {
            debug!(command = %self.program, %status, "process already exited");
            return Ok(());
        }

        child.start_kill()?;
        match tokio::time::timeout(KILL_TIMEOUT, child.wait()).await {
            Ok(status) => {
                let status = status?;
                info!(command = %self.program, %status, "process stopped");
                Ok(())
            }
            Err(_) => {
                warn!(command = %self.program, "process did not exit after kill");
                Err(E2eError::process(self.command_line(), "did not exit after kill"))
            }
        }
    }
}
