//! Parser for text-format metric pages.
//!
//! Accepts the Prometheus exposition format (`name{labels} value`) as well as
//! the plain `name: value` and `name value` lines of an admin stats page.
//! Comment lines and lines that do not end in a number are skipped.

use std::collections::BTreeMap;

/// Metric values scraped from one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    series: BTreeMap<String, f64>,
}

impl MetricsSnapshot {
    /// Parse a metrics page.
    pub fn parse(text: &str) -> Self {
        let series = text.lines().filter_map(parse_line).collect();
        Self { series }
    }

    /// Value of a series, keyed by its full name including labels.
    ///
    /// A bare name also matches a single series written as `name{}`.
    pub fn get(&self, series: &str) -> Option<f64> {
        self.series
            .get(series)
            .or_else(|| self.series.get(&format!("{series}{{}}")))
            .copied()
    }

    /// Sum of every series of the family `name`, across label sets.
    ///
    /// Returns `None` when no series of the family exists.
    pub fn sum(&self, name: &str) -> Option<f64> {
        let mut found = false;
        let total: f64 = self
            .series
            .iter()
            .filter(|(key, _)| family(key) == name)
            .map(|(_, v)| {
                found = true;
                *v
            })
            .sum();
        found.then_some(total)
    }

    /// Number of series.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Whether the page had no series.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Iterate over `(series, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.series.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

fn family(series: &str) -> &str {
    series.split_once('{').map_or(series, |(name, _)| name)
}

fn parse_line(line: &str) -> Option<(String, f64)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    // Label values may contain spaces, so split after the closing brace.
    let (series, rest) = match line.find('{') {
        Some(open) => {
            let close = open + line[open..].find('}')?;
            (&line[..=close], &line[close + 1..])
        }
        None => {
            let end = line.find(|c: char| c.is_whitespace() || c == ':')?;
            (&line[..end], &line[end..])
        }
    };

    let rest = rest.trim_start_matches(':').trim();
    // Prometheus lines may carry a trailing timestamp.
    let value = rest.split_whitespace().next()?.parse().ok()?;
    Some((series.to_string(), value))
}
