//! Strategies for comparing a scraped metric against an expectation.

use std::fmt;

use e2e_core::{E2eError, E2eResult};

use crate::params::Params;
use crate::prometheus::MetricsSnapshot;

/// Decides whether a metric has reached its expected value.
pub trait StatMatcher: Send + Sync + fmt::Debug {
    /// Series or family name to read.
    fn metric(&self) -> &str;

    /// Resolve anything that depends on the scenario before polling starts.
    fn prepare(&mut self, _params: &Params) -> E2eResult<()> {
        Ok(())
    }

    /// Whether `observed` satisfies the expectation.
    fn matches(&self, observed: f64) -> bool;

    /// The expectation, for error messages.
    fn expected(&self) -> String;

    /// Read the metric from a snapshot.
    ///
    /// An exact series match wins; otherwise the family is summed.
    fn observe(&self, snapshot: &MetricsSnapshot) -> Option<f64> {
        snapshot
            .get(self.metric())
            .or_else(|| snapshot.sum(self.metric()))
    }
}

/// The metric equals a value.
#[derive(Debug, Clone, PartialEq)]
pub struct ExactStat {
    metric: String,
    value: f64,
}

impl ExactStat {
    /// Expect `metric` to equal `value`.
    pub fn new(metric: impl Into<String>, value: f64) -> Self {
        Self {
            metric: metric.into(),
            value,
        }
    }
}

impl StatMatcher for ExactStat {
    fn metric(&self) -> &str {
        &self.metric
    }

    fn matches(&self, observed: f64) -> bool {
        observed == self.value
    }

    fn expected(&self) -> String {
        self.value.to_string()
    }
}

/// A counter has reached at least a value.
#[derive(Debug, Clone, PartialEq)]
pub struct AtLeastStat {
    metric: String,
    min: f64,
}

impl AtLeastStat {
    /// Expect `metric` to be `min` or more.
    pub fn new(metric: impl Into<String>, min: f64) -> Self {
        Self {
            metric: metric.into(),
            min,
        }
    }
}

impl StatMatcher for AtLeastStat {
    fn metric(&self) -> &str {
        &self.metric
    }

    fn matches(&self, observed: f64) -> bool {
        observed >= self.min
    }

    fn expected(&self) -> String {
        format!(">= {}", self.min)
    }
}

/// The metric equals a value rendered from a `{{var}}` template.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateStat {
    metric: String,
    template: String,
    value: Option<f64>,
}

impl TemplateStat {
    /// Expect `metric` to equal `template` once filled from the scenario
    /// variables.
    pub fn new(metric: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            template: template.into(),
            value: None,
        }
    }
}

impl StatMatcher for TemplateStat {
    fn metric(&self) -> &str {
        &self.metric
    }

    fn prepare(&mut self, params: &Params) -> E2eResult<()> {
        let rendered = params.fill(&self.template)?;
        let value = rendered.trim().parse().map_err(|_| {
            E2eError::Configuration(format!(
                "expected value {rendered:?} for {} is not a number",
                self.metric
            ))
        })?;
        self.value = Some(value);
        Ok(())
    }

    fn matches(&self, observed: f64) -> bool {
        self.value == Some(observed)
    }

    fn expected(&self) -> String {
        match self.value {
            Some(v) => v.to_string(),
            None => self.template.clone(),
        }
    }
}
