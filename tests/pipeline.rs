//! End-to-end cycles: HTTP source -> orchestrator -> shipper -> backend.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use metricsd::{
    config::{
        metrics::{HttpEndpoint, MetricsConfig},
        shipper::{ShipperConfig, ShipperKind},
    },
    core::{
        collectors::Registry,
        orchestrator::{Orchestrator, OrchestratorError},
        shipper::{self, json::Envelope, prompb::WriteRequest},
    },
};
use prost::Message;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
struct Backend {
    received: Arc<Mutex<Vec<(HeaderMap, Bytes)>>>,
    fail_first: Arc<Mutex<bool>>,
}

async fn ingest(State(backend): State<Backend>, headers: HeaderMap, body: Bytes) -> (StatusCode, String) {
    backend.received.lock().unwrap().push((headers, body));

    let mut fail = backend.fail_first.lock().unwrap();
    if *fail {
        *fail = false;
        return (StatusCode::INTERNAL_SERVER_ERROR, "overload".into());
    }
    (StatusCode::OK, String::new())
}

async fn app_stats() -> Json<serde_json::Value> {
    Json(json!({"requests": 42, "latency_ms": 3.5, "version": "1.2.0"}))
}

async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{address}")
}

async fn start_backend(backend: Backend) -> String {
    spawn(
        Router::new()
            .route("/write", post(ingest))
            .with_state(backend),
    )
    .await
}

async fn app_registry() -> Registry {
    let app = spawn(Router::new().route("/stats", get(app_stats))).await;

    let mut config = MetricsConfig::default();
    config.system.enabled = false;
    config.http.endpoints.push(HttpEndpoint {
        name: "app".into(),
        url: format!("{app}/stats"),
    });
    Registry::from_config(&config).unwrap()
}

/// Runs the orchestrator until `wait` has elapsed, then cancels it.
async fn run_for(orchestrator: &Orchestrator, wait: Duration) -> Result<(), OrchestratorError> {
    let ctx = CancellationToken::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(wait).await;
        canceller.cancel();
    });
    orchestrator.start(&ctx).await
}

#[tokio::test]
async fn json_pipeline_delivers_scraped_metrics() {
    let backend = Backend::default();
    let url = start_backend(backend.clone()).await;

    let shipper = shipper::build(&ShipperConfig {
        kind: ShipperKind::Json,
        endpoint: format!("{url}/write"),
        timeout_secs: 5,
        ..Default::default()
    })
    .unwrap();

    let orchestrator = Orchestrator::new(app_registry().await, shipper, Duration::from_secs(3600));
    let result = run_for(&orchestrator, Duration::from_millis(500)).await;
    assert_eq!(result, Err(OrchestratorError::Cancelled));

    let received = backend.received.lock().unwrap();
    assert_eq!(received.len(), 1);
    let (headers, body) = &received[0];
    assert_eq!(headers["content-type"], "application/json");

    let envelope: Envelope<'_> = serde_json::from_slice(body).unwrap();
    let mut names: Vec<_> = envelope.metrics.iter().map(|m| m.name.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["app_latency_ms", "app_requests"]);
    assert!(envelope.metrics.iter().all(|m| m.labels["endpoint"] == "app"));
}

#[tokio::test]
async fn remote_write_pipeline_recovers_after_backend_error() {
    let backend = Backend::default();
    *backend.fail_first.lock().unwrap() = true;
    let url = start_backend(backend.clone()).await;

    let shipper = shipper::build(&ShipperConfig {
        kind: ShipperKind::RemoteWrite,
        endpoint: format!("{url}/write"),
        timeout_secs: 5,
        ..Default::default()
    })
    .unwrap();

    let orchestrator = Orchestrator::new(app_registry().await, shipper, Duration::from_millis(100));
    run_for(&orchestrator, Duration::from_millis(350)).await.unwrap_err();

    let stats = orchestrator.stats();
    assert_eq!(stats.failed_shipments, 1);
    assert!(stats.shipped >= 1, "{stats:?}");

    let received = backend.received.lock().unwrap();
    assert!(received.len() >= 2);

    let (headers, body) = received.last().unwrap();
    assert_eq!(headers["content-encoding"], "snappy");
    assert_eq!(headers["content-type"], "application/x-protobuf");
    assert_eq!(headers["x-prometheus-remote-write-version"], "0.1.0");

    let raw = snap::raw::Decoder::new().decompress_vec(body).unwrap();
    let request = WriteRequest::decode(raw.as_slice()).unwrap();
    assert_eq!(request.timeseries.len(), 2);
    for series in &request.timeseries {
        assert_eq!(series.labels[0].name, "__name__");
        assert!(series.labels[0].value.starts_with("app_"));
        assert_eq!(series.samples.len(), 1);
    }
}

#[tokio::test]
async fn closed_shipper_fails_every_cycle() {
    let backend = Backend::default();
    let url = start_backend(backend.clone()).await;

    let shipper = shipper::build(&ShipperConfig {
        endpoint: format!("{url}/write"),
        ..Default::default()
    })
    .unwrap();
    shipper.close();

    let orchestrator = Orchestrator::new(app_registry().await, shipper, Duration::from_secs(3600));
    orchestrator.stop();
    orchestrator.start(&CancellationToken::new()).await.unwrap();

    assert_eq!(orchestrator.stats().failed_shipments, 1);
    assert!(backend.received.lock().unwrap().is_empty());
}
