//! JSON envelope shipper.
//!
//! Each batch is POSTed as
//! `{"timestamp": <unix seconds>, "metrics": [{"name", "value", "type", "labels"}]}`.

use std::{borrow::Cow, sync::Arc};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{
    Shipper,
    error::{ShipError, ShipperBuildError},
    tls::build_client,
    transport::{HttpTransport, OutboundRequest, Transport, deliver},
};
use crate::{config::shipper::ShipperConfig, core::metric::Metric};

/// Wire shape of one shipment.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<'a> {
    pub timestamp: i64,
    pub metrics: Cow<'a, [Metric]>,
}

pub struct JsonShipper {
    endpoint: String,
    transport: Arc<dyn Transport>,
}

impl JsonShipper {
    pub fn new(config: &ShipperConfig) -> Result<Self, ShipperBuildError> {
        let client = build_client(config)?;
        Ok(Self::with_transport(
            config.endpoint.clone(),
            Arc::new(HttpTransport::new(client)),
        ))
    }

    pub fn with_transport(endpoint: String, transport: Arc<dyn Transport>) -> Self {
        Self {
            endpoint,
            transport,
        }
    }

    /// Fails on NaN or infinite values, which JSON numbers cannot represent.
    fn encode(batch: &[Metric]) -> Result<Vec<u8>, ShipError> {
        if let Some(metric) = batch.iter().find(|m| !m.value.is_finite()) {
            return Err(ShipError::Encode(format!(
                "metric {} has non-finite value {}",
                metric.name, metric.value
            )));
        }

        let envelope = Envelope {
            timestamp: OffsetDateTime::now_utc().unix_timestamp(),
            metrics: Cow::Borrowed(batch),
        };
        serde_json::to_vec(&envelope).map_err(|e| ShipError::Encode(e.to_string()))
    }
}

#[async_trait::async_trait]
impl Shipper for JsonShipper {
    fn name(&self) -> &'static str {
        "json"
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn ship(&self, ctx: &CancellationToken, batch: &[Metric]) -> Result<(), ShipError> {
        if batch.is_empty() {
            debug!("Empty batch, nothing to ship");
            return Ok(());
        }

        let body = Self::encode(batch)?;
        let request = OutboundRequest {
            endpoint: self.endpoint.clone(),
            headers: vec![("Content-Type", "application/json")],
            body,
        };

        deliver(self.transport.as_ref(), ctx, request).await?;
        info!(
            metric_count = batch.len(),
            endpoint = %self.endpoint,
            "Metrics shipped"
        );
        Ok(())
    }

    fn close(&self) {
        self.transport.close();
    }
}
