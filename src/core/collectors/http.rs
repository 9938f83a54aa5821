//! Source that polls JSON documents from HTTP endpoints.
//!
//! Every configured endpoint is expected to answer `GET` with a flat JSON
//! object. Each numeric top-level field becomes a gauge named `app_<field>`
//! labelled with the endpoint name. An endpoint that is unreachable, answers
//! with a non-200 status or returns something other than a JSON object is
//! skipped for the current cycle; the remaining endpoints still contribute.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{error::CollectorError, traits::Source, types::CollectorResult};
use crate::{
    config::metrics::HttpEndpoint,
    core::metric::{Batch, Metric},
};

/// Prefix applied to every metric scraped from an endpoint.
const METRIC_PREFIX: &str = "app_";

pub struct HttpSource {
    endpoints: Vec<HttpEndpoint>,
    client: Client,
}

impl HttpSource {
    /// Builds the source and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::Http` if the client cannot be constructed.
    pub fn new(endpoints: Vec<HttpEndpoint>, timeout: Duration) -> CollectorResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| CollectorError::Http {
                url: "<client>".to_string(),
                source,
            })?;

        Ok(Self { endpoints, client })
    }

    async fn scrape(&self, endpoint: &HttpEndpoint) -> CollectorResult<Batch> {
        let response = self
            .client
            .get(&endpoint.url)
            .send()
            .await
            .map_err(|source| CollectorError::Http {
                url: endpoint.url.clone(),
                source,
            })?;

        if response.status() != StatusCode::OK {
            return Err(CollectorError::UnexpectedStatus {
                url: endpoint.url.clone(),
                status: response.status().as_u16(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|source| CollectorError::Http {
                url: endpoint.url.clone(),
                source,
            })?;

        match body {
            Value::Object(fields) => Ok(parse_fields(&endpoint.name, &fields)),
            other => Err(CollectorError::InvalidFormat {
                location: endpoint.url.clone(),
                reason: format!("expected a JSON object, got {}", json_type(&other)),
            }),
        }
    }
}

#[async_trait::async_trait]
impl Source for HttpSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn collect(&self, ctx: &CancellationToken) -> CollectorResult<Batch> {
        let mut batch = Batch::new();

        for endpoint in &self.endpoints {
            let outcome = tokio::select! {
                _ = ctx.cancelled() => return Err(CollectorError::Cancelled),
                outcome = self.scrape(endpoint) => outcome,
            };

            match outcome {
                Ok(metrics) => {
                    debug!(
                        endpoint = %endpoint.name,
                        metric_count = metrics.len(),
                        "Scraped endpoint"
                    );
                    batch.extend(metrics);
                }
                Err(e) => {
                    warn!(
                        endpoint = %endpoint.name,
                        url = %endpoint.url,
                        error = %e,
                        "Failed to scrape endpoint"
                    );
                }
            }
        }

        Ok(batch)
    }
}

/// Turns the numeric fields of a JSON object into gauges. Non-numeric values
/// are ignored.
fn parse_fields(endpoint_name: &str, fields: &Map<String, Value>) -> Batch {
    fields
        .iter()
        .filter_map(|(key, value)| {
            value.as_f64().map(|v| {
                Metric::gauge(format!("{METRIC_PREFIX}{key}"), v).with_label("endpoint", endpoint_name)
            })
        })
        .collect()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use axum::{Json, Router, http::StatusCode as AxumStatus, routing::get};
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;
    use crate::core::metric::MetricKind;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn endpoint(name: &str, url: String) -> HttpEndpoint {
        HttpEndpoint {
            name: name.to_string(),
            url,
        }
    }

    #[test]
    fn numeric_fields_become_gauges() {
        let fields = json!({
            "requests": 42,
            "latency_ms": 12.5,
            "status": "ok",
            "flags": [1, 2],
            "enabled": true
        });
        let Value::Object(fields) = fields else {
            unreachable!()
        };

        let mut batch = parse_fields("api", &fields);
        batch.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].name, "app_latency_ms");
        assert_eq!(batch[0].value, 12.5);
        assert_eq!(batch[1].name, "app_requests");
        assert_eq!(batch[1].value, 42.0);
        assert!(batch.iter().all(|m| m.kind == MetricKind::Gauge));
        assert!(batch.iter().all(|m| m.labels["endpoint"] == "api"));
    }

    #[tokio::test]
    async fn unhealthy_endpoints_are_skipped() {
        let base = serve(
            Router::new()
                .route("/good", get(|| async { Json(json!({"queue_depth": 3})) }))
                .route("/down", get(|| async { (AxumStatus::SERVICE_UNAVAILABLE, "down") }))
                .route("/list", get(|| async { Json(json!([1, 2, 3])) })),
        )
        .await;

        let source = HttpSource::new(
            vec![
                endpoint("down", format!("{base}/down")),
                endpoint("list", format!("{base}/list")),
                endpoint("good", format!("{base}/good")),
            ],
            Duration::from_secs(2),
        )
        .unwrap();

        let batch = source.collect(&CancellationToken::new()).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].name, "app_queue_depth");
        assert_eq!(batch[0].labels["endpoint"], "good");
    }

    #[tokio::test]
    async fn cancelled_token_aborts_collection() {
        let base = serve(Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"x": 1}))
            }),
        ))
        .await;

        let source =
            HttpSource::new(vec![endpoint("slow", format!("{base}/slow"))], Duration::from_secs(10))
                .unwrap();

        let ctx = CancellationToken::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let result = source.collect(&ctx).await;
        assert!(matches!(result, Err(CollectorError::Cancelled)));
    }
}
