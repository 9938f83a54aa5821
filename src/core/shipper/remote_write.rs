//! Prometheus remote-write shipper.
//!
//! Every metric becomes one time series with a single sample stamped at send
//! time. The `WriteRequest` is protobuf-encoded, compressed with the Snappy
//! block format and POSTed with the headers receivers expect for 0.1.0.

use std::sync::Arc;

use prost::Message;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    Shipper,
    error::{ShipError, ShipperBuildError},
    prompb::{Label, METRIC_NAME_LABEL, Sample, TimeSeries, WriteRequest},
    tls::build_client,
    transport::{HttpTransport, OutboundRequest, Transport, deliver},
};
use crate::{config::shipper::ShipperConfig, core::metric::Metric};

const REMOTE_WRITE_HEADERS: [(&str, &str); 3] = [
    ("Content-Encoding", "snappy"),
    ("Content-Type", "application/x-protobuf"),
    ("X-Prometheus-Remote-Write-Version", "0.1.0"),
];

pub struct RemoteWriteShipper {
    endpoint: String,
    transport: Arc<dyn Transport>,
}

impl RemoteWriteShipper {
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
}

/// Converts a batch into a `WriteRequest`, one series per metric.
///
/// `__name__` is always the first label. A source-supplied `__name__` label
/// is dropped so it can neither duplicate nor override the metric name.
pub fn to_write_request(batch: &[Metric], timestamp_ms: i64) -> WriteRequest {
    let timeseries = batch
        .iter()
        .map(|metric| {
            let mut labels = Vec::with_capacity(metric.labels.len() + 1);
            labels.push(Label::new(METRIC_NAME_LABEL, metric.name.as_str()));

            for (name, value) in &metric.labels {
                if name == METRIC_NAME_LABEL {
                    warn!(
                        metric = %metric.name,
                        value = %value,
                        "Dropping reserved __name__ label"
                    );
                    continue;
                }
                labels.push(Label::new(name.as_str(), value.as_str()));
            }

            TimeSeries {
                labels,
                samples: vec![Sample {
                    value: metric.value,
                    timestamp: timestamp_ms,
                }],
            }
        })
        .collect();

    WriteRequest { timeseries }
}

/// Protobuf-encodes and Snappy-compresses (raw block format) a request.
pub fn encode(request: &WriteRequest) -> Result<Vec<u8>, ShipError> {
    let raw = request.encode_to_vec();
    Ok(snap::raw::Encoder::new().compress_vec(&raw)?)
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[async_trait::async_trait]
impl Shipper for RemoteWriteShipper {
    fn name(&self) -> &'static str {
        "remote_write"
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn ship(&self, ctx: &CancellationToken, batch: &[Metric]) -> Result<(), ShipError> {
        if batch.is_empty() {
            debug!("Empty batch, nothing to ship");
            return Ok(());
        }

        let write_request = to_write_request(batch, now_millis());
        let body = encode(&write_request)?;
        let request = OutboundRequest {
            endpoint: self.endpoint.clone(),
            headers: REMOTE_WRITE_HEADERS.to_vec(),
            body,
        };

        deliver(self.transport.as_ref(), ctx, request).await?;
        info!(
            metric_count = batch.len(),
            series = write_request.timeseries.len(),
            endpoint = %self.endpoint,
            "Metrics shipped via remote write"
        );
        Ok(())
    }

    fn close(&self) {
        self.transport.close();
    }
}
