//! Configuration of the shipping backend and its transport security.
//!
//! ```toml
//! [shipper]
//! kind = "remote_write"
//! endpoint = "https://prometheus.example.com/api/v1/write"
//! timeout_secs = 30
//!
//! [shipper.tls]
//! enabled = true
//! cert_file = "/etc/metricsd/client.crt"
//! key_file = "/etc/metricsd/client.key"
//! ca_file = "/etc/metricsd/ca.pem"
//! ```

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Wire protocol used to deliver batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipperKind {
    /// JSON envelope over HTTP POST.
    #[default]
    #[serde(alias = "http_json")]
    Json,
    /// Snappy-compressed protobuf, Prometheus remote-write 0.1.0.
    #[serde(alias = "prometheus_remote_write")]
    RemoteWrite,
}

impl fmt::Display for ShipperKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShipperKind::Json => write!(f, "json"),
            ShipperKind::RemoteWrite => write!(f, "remote_write"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ShipperConfig {
    pub kind: ShipperKind,

    /// Absolute URL batches are POSTed to.
    #[validate(url(message = "Shipper endpoint must be a valid URL"))]
    pub endpoint: String,

    /// Upper bound for a single shipping request, in seconds.
    #[validate(range(min = 1, message = "Shipper timeout must be at least 1 second"))]
    pub timeout_secs: u64,

    #[validate(nested)]
    pub tls: TlsConfig,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            kind: ShipperKind::Json,
            endpoint: "http://localhost:8080/api/v1/metrics".to_string(),
            timeout_secs: 30,
            tls: TlsConfig::default(),
        }
    }
}

impl ShipperConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Client-side TLS settings. Files are read when the shipper is built, so a
/// missing or malformed file stops the agent before the first cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_client_identity"))]
pub struct TlsConfig {
    pub enabled: bool,

    /// PEM client certificate. Required when TLS is enabled.
    pub cert_file: Option<String>,

    /// PEM private key matching `cert_file`. Required when TLS is enabled.
    pub key_file: Option<String>,

    /// PEM bundle of trusted CAs. When absent the built-in roots are used.
    pub ca_file: Option<String>,

    /// Disables server certificate verification. Development only.
    pub insecure_skip_verify: bool,
}

impl TlsConfig {
    /// Client identity paths, if both are configured and non-empty.
    pub fn identity_paths(&self) -> Option<(&str, &str)> {
        match (self.cert_file.as_deref(), self.key_file.as_deref()) {
            (Some(cert), Some(key)) if !cert.is_empty() && !key.is_empty() => Some((cert, key)),
            _ => None,
        }
    }

    /// CA bundle path, treating an empty string as absent.
    pub fn ca_path(&self) -> Option<&str> {
        self.ca_file.as_deref().filter(|p| !p.is_empty())
    }
}

fn validate_client_identity(tls: &TlsConfig) -> Result<(), ValidationError> {
    if tls.enabled && tls.identity_paths().is_none() {
        return Err(ValidationError::new("missing_client_identity")
            .with_message("TLS requires both cert_file and key_file".into()));
    }
    Ok(())
}
