//! The unit of data exchanged between sources, the registry and shippers.
//!
//! A [`Metric`] is a single observed value at collection time. Metrics are
//! produced by sources, concatenated into a [`Batch`] once per cycle and
//! discarded after the batch has been shipped (or failed to ship).

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// Label set attached to a metric. Keys are unique by construction.
pub type Labels = BTreeMap<String, String>;

/// Ordered sequence of metrics produced by one collection cycle.
pub type Batch = Vec<Metric>;

/// Value semantics of a metric.
///
/// Advisory only: the pipeline carries the kind through to the wire but never
/// enforces monotonicity for counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Point-in-time value.
    #[default]
    Gauge,
    /// Monotonically accumulating value.
    Counter,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed value.
///
/// The serialized form is the JSON wire shape used by the JSON shipper:
/// `{"name", "value", "type", "labels"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Series name. Sources must not emit an empty name.
    pub name: String,

    /// Observed value.
    pub value: f64,

    /// Gauge or counter.
    #[serde(rename = "type")]
    pub kind: MetricKind,

    /// Label set, possibly empty.
    #[serde(default)]
    pub labels: Labels,
}

impl Metric {
    /// Creates a gauge with no labels.
    pub fn gauge(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            kind: MetricKind::Gauge,
            labels: Labels::new(),
        }
    }

    /// Creates a counter with no labels.
    pub fn counter(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            kind: MetricKind::Counter,
            labels: Labels::new(),
        }
    }

    /// Adds a single label, replacing any previous value for the same key.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Replaces the whole label set.
    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }
}
