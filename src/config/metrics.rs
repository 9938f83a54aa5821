//! Configuration of the collection cycle and of the built-in sources.
//!
//! ```toml
//! [metrics]
//! interval_secs = 60
//!
//! [metrics.system]
//! cpu = true
//! memory = true
//! disk = true
//! network = true
//!
//! [metrics.http]
//! timeout_secs = 10
//!
//! [[metrics.http.endpoints]]
//! name = "api"
//! url = "http://127.0.0.1:3000/stats"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Top-level metrics configuration container.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MetricsConfig {
    /// Seconds between two collection cycles. The first cycle runs immediately.
    #[validate(range(min = 1, message = "Collection interval must be at least 1 second"))]
    pub interval_secs: u64,

    /// Host statistics source.
    #[validate(nested)]
    pub system: SystemConfig,

    /// HTTP-polling source.
    #[validate(nested)]
    pub http: HttpSourceConfig,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            system: SystemConfig::default(),
            http: HttpSourceConfig::default(),
        }
    }
}

impl MetricsConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Names of the sources that will be registered with this configuration.
    pub fn enabled_sources(&self) -> Vec<&'static str> {
        let mut names = Vec::with_capacity(2);
        if self.system.enabled {
            names.push("system");
        }
        if self.http.is_enabled() {
            names.push("http");
        }
        names
    }
}

/// Toggles for the groups of the system source.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SystemConfig {
    /// Registers the system source at all.
    pub enabled: bool,

    pub cpu: bool,
    pub memory: bool,
    pub disk: bool,
    pub network: bool,

    /// Milliseconds between the two `/proc/stat` samples used to compute CPU
    /// utilisation.
    #[validate(range(
        min = 10,
        max = 60000,
        message = "CPU sample window must be between 10ms and 60s"
    ))]
    pub cpu_sample_window_ms: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cpu: true,
            memory: true,
            disk: true,
            network: true,
            cpu_sample_window_ms: 1000,
        }
    }
}

/// Endpoints polled by the HTTP source.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct HttpSourceConfig {
    /// Per-request timeout in seconds.
    #[validate(range(min = 1, message = "HTTP source timeout must be at least 1 second"))]
    pub timeout_secs: u64,

    /// Endpoints to scrape. The source is registered only if this is non-empty.
    #[validate(nested)]
    pub endpoints: Vec<HttpEndpoint>,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            endpoints: Vec::new(),
        }
    }
}

impl HttpSourceConfig {
    pub fn is_enabled(&self) -> bool {
        !self.endpoints.is_empty()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// A single JSON endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct HttpEndpoint {
    /// Value of the `endpoint` label on every scraped metric.
    #[validate(length(min = 1, message = "Endpoint name must not be empty"))]
    pub name: String,

    #[validate(url(message = "Endpoint url must be a valid URL"))]
    pub url: String,
}
