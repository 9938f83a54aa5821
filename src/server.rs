//! Liveness endpoint.
//!
//! `GET /health` answers `{"status": "healthy", "timestamp": <RFC 3339>, "uptime": "1h2m3s"}`.
//! Any other method on the route gets `405 Method Not Allowed`.

use std::time::{Duration, Instant};

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::server::ServerConfig;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind health server to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Health server failed: {0}")]
    Serve(#[source] std::io::Error),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub uptime: String,
}

/// Router exposing `/health`, reporting uptime relative to `started`.
pub fn router(started: Instant) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(started)
}

async fn health_handler(State(started): State<Instant>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy".to_string(),
        timestamp: OffsetDateTime::now_utc(),
        uptime: format_uptime(started.elapsed()),
    })
}

/// Renders whole seconds as `3h25m7s`, omitting leading zero units.
fn format_uptime(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);

    match (hours, minutes) {
        (0, 0) => format!("{seconds}s"),
        (0, _) => format!("{minutes}m{seconds}s"),
        _ => format!("{hours}h{minutes}m{seconds}s"),
    }
}

pub struct HealthServer {
    config: ServerConfig,
    started: Instant,
}

impl HealthServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            started: Instant::now(),
        }
    }

    /// Serves until `ctx` is cancelled, then shuts down gracefully.
    pub async fn serve(self, ctx: CancellationToken) -> Result<(), ServerError> {
        let address = self.config.bind_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::Bind {
                address: address.clone(),
                source,
            })?;

        info!(address = %address, "Health server listening");

        axum::serve(listener, router(self.started))
            .with_graceful_shutdown(async move { ctx.cancelled().await })
            .await
            .map_err(ServerError::Serve)?;

        info!("Health server stopped");
        Ok(())
    }
}
