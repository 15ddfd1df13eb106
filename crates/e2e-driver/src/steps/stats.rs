//! Polls a metrics page until every expected stat is reached.

use std::time::Duration;

use async_trait::async_trait;
use e2e_core::{E2eError, E2eResult};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::matcher::StatMatcher;
use crate::params::Params;
use crate::prometheus::MetricsSnapshot;
use crate::step::Step;
use crate::steps::probe::Target;

/// Default stats page of the proxy admin endpoint.
pub const DEFAULT_STATS_PATH: &str = "/stats/prometheus";

/// Polling behaviour of [`StatsVerify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsConfig {
    /// Overall time allowed for every stat to match.
    pub timeout: Duration,
    /// Pause between scrapes.
    pub interval: Duration,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            interval: Duration::from_millis(500),
        }
    }
}

/// Verify that the admin metrics eventually match.
///
/// The page is scraped until every matcher is satisfied or the timeout
/// elapses. A failed scrape, for instance while the proxy is still
/// starting, is retried and leaves the last observed value in place.
#[derive(Debug)]
pub struct StatsVerify {
    matchers: Vec<Box<dyn StatMatcher>>,
    target: Target,
    path: String,
    config: StatsConfig,
}

impl StatsVerify {
    /// Verify the admin endpoint's default stats page.
    pub fn new() -> Self {
        Self {
            matchers: Vec::new(),
            target: Target::Admin,
            path: DEFAULT_STATS_PATH.to_string(),
            config: StatsConfig::default(),
        }
    }

    /// Add a matcher.
    pub fn expect(mut self, matcher: impl StatMatcher + 'static) -> Self {
        self.matchers.push(Box::new(matcher));
        self
    }

    /// Scrape another port.
    pub fn target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    /// Scrape another path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the polling behaviour.
    pub fn config(mut self, config: StatsConfig) -> Self {
        self.config = config;
        self
    }

    async fn scrape(client: &reqwest::Client, url: &str) -> E2eResult<MetricsSnapshot> {
        let response = client.get(url).send().await?.error_for_status()?;
        Ok(MetricsSnapshot::parse(&response.text().await?))
    }

    /// Index of the first unmatched stat and the value it showed, if any.
    fn first_unmatched(&self, snapshot: &MetricsSnapshot) -> Option<(usize, Option<f64>)> {
        self.matchers.iter().enumerate().find_map(|(i, m)| {
            let observed = m.observe(snapshot);
            match observed {
                Some(v) if m.matches(v) => None,
                _ => Some((i, observed)),
            }
        })
    }
}

impl Default for StatsVerify {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Step for StatsVerify {
    fn name(&self) -> String {
        let metrics: Vec<_> = self.matchers.iter().map(|m| m.metric()).collect();
        format!("verify stats [{}]", metrics.join(", "))
    }

    async fn run(&mut self, params: &mut Params) -> E2eResult<()> {
        for matcher in &mut self.matchers {
            matcher.prepare(params)?;
        }
        if self.matchers.is_empty() {
            return Ok(());
        }

        let url = format!(
            "http://127.0.0.1:{}{}",
            self.target.port(params),
            params.fill(&self.path)?
        );
        let client = reqwest::Client::builder()
            .timeout(self.config.interval.max(Duration::from_secs(1)))
            .build()?;
        let deadline = Instant::now() + self.config.timeout;
        // (matcher index, last value seen for it)
        let mut pending: (usize, Option<f64>) = (0, None);

        loop {
            match Self::scrape(&client, &url).await {
                Ok(snapshot) => match self.first_unmatched(&snapshot) {
                    None => {
                        info!(url = %url, stats = self.matchers.len(), "stats matched");
                        return Ok(());
                    }
                    Some(unmatched) => pending = unmatched,
                },
                Err(e) => debug!(url = %url, error = %e, "stats scrape failed"),
            }

            if Instant::now() + self.config.interval > deadline {
                let matcher = &self.matchers[pending.0];
                return Err(E2eError::StatTimeout {
                    metric: matcher.metric().to_string(),
                    expected: matcher.expected(),
                    last_observed: pending.1,
                    waited: self.config.timeout,
                });
            }
            tokio::time::sleep(self.config.interval).await;
        }
    }
}
