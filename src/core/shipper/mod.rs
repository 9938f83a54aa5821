//! Delivery of collected batches to a remote backend.
//!
//! A [`Shipper`] owns a long-lived HTTP client and turns a batch into one
//! request in its wire format. Two formats exist: a JSON envelope
//! ([`json::JsonShipper`]) and Prometheus remote write
//! ([`remote_write::RemoteWriteShipper`]).

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    config::shipper::{ShipperConfig, ShipperKind},
    core::metric::Metric,
};

pub mod error;
pub mod json;
pub mod prompb;
pub mod remote_write;
pub mod tls;
pub mod transport;

pub use error::{ShipError, ShipperBuildError};

#[async_trait::async_trait]
pub trait Shipper: Send + Sync {
    /// Short protocol name used in logs.
    fn name(&self) -> &'static str;

    /// Destination URL used in logs.
    fn endpoint(&self) -> &str;

    /// Delivers `batch`. An empty batch succeeds without touching the network.
    async fn ship(&self, ctx: &CancellationToken, batch: &[Metric]) -> Result<(), ShipError>;

    /// Releases pooled connections. Idempotent; later `ship` calls fail with
    /// [`ShipError::Closed`].
    fn close(&self);
}

/// Builds the shipper selected by `config.kind`.
///
/// # Errors
///
/// Fails when the TLS material cannot be read or parsed, or the HTTP client
/// cannot be constructed.
pub fn build(config: &ShipperConfig) -> Result<Arc<dyn Shipper>, ShipperBuildError> {
    let shipper: Arc<dyn Shipper> = match config.kind {
        ShipperKind::Json => Arc::new(json::JsonShipper::new(config)?),
        ShipperKind::RemoteWrite => Arc::new(remote_write::RemoteWriteShipper::new(config)?),
    };

    info!(
        kind = shipper.name(),
        endpoint = shipper.endpoint(),
        tls = config.tls.enabled,
        timeout_secs = config.timeout_secs,
        "Shipper initialized"
    );
    Ok(shipper)
}
