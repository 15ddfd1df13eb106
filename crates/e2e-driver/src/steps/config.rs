use std::path::PathBuf;

use async_trait::async_trait;
use e2e_core::{E2eError, E2eResult};
use tracing::{debug, info, warn};

use crate::params::Params;
use crate::step::Step;

/// Where a rendered configuration is delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigTarget {
    /// Write to a file, removed again on cleanup.
    File(PathBuf),
    /// POST to a URL; `{{var}}` placeholders in the URL are filled.
    Http(String),
}

/// Render a `{{var}}` template and hand it to the proxy or its control plane.
#[derive(Debug, Clone)]
pub struct PushConfig {
    template: String,
    target: ConfigTarget,
    written: Option<PathBuf>,
}

impl PushConfig {
    /// Deliver `template` to `target`.
    pub fn new(template: impl Into<String>, target: ConfigTarget) -> Self {
        Self {
            template: template.into(),
            target,
            written: None,
        }
    }

    /// Write the rendered template to `path`.
    pub fn to_file(template: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(template, ConfigTarget::File(path.into()))
    }

    /// POST the rendered template to `url`.
    pub fn to_url(template: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(template, ConfigTarget::Http(url.into()))
    }
}

#[async_trait]
impl Step for PushConfig {
    fn name(&self) -> String {
        match &self.target {
            ConfigTarget::File(path) => format!("push config to {}", path.display()),
            ConfigTarget::Http(url) => format!("push config to {url}"),
        }
    }

    async fn run(&mut self, params: &mut Params) -> E2eResult<()> {
        let rendered = params.fill(&self.template)?;

        match &self.target {
            ConfigTarget::File(path) => {
                if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(dir).await?;
                }
                // Recorded first so a partial write is still removed.
                self.written = Some(path.clone());
                tokio::fs::write(path, rendered.as_bytes()).await?;
                info!(path = %path.display(), bytes = rendered.len(), "config written");
            }
            ConfigTarget::Http(url) => {
                let url = params.fill(url)?;
                let response = reqwest::Client::new()
                    .post(&url)
                    .body(rendered)
                    .send()
                    .await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(E2eError::Status {
                        url,
                        expected: 200,
                        actual: status.as_u16(),
                    });
                }
                info!(url = %url, "config pushed");
            }
        }
        Ok(())
    }

    async fn cleanup(&mut self) -> E2eResult<()> {
        let Some(path) = self.written.take() else {
            return Ok(());
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "config removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to remove config");
                return Err(e.into());
            }
        }
        Ok(())
    }
}
