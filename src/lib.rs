//! metricsd — host and application telemetry agent
//!
//! The agent polls a set of metric sources on a fixed interval and ships each
//! cycle's batch to a remote backend, either as a JSON envelope or as a
//! Prometheus remote-write request (protobuf + Snappy, optionally over mutual
//! TLS).
//!
//! ## Modules
//!
//! * `config` — TOML configuration, defaults and validation via `validator`.
//!
//! * `core` — The pipeline:
//!   - Metric model and sources (Linux host statistics, HTTP JSON endpoints)
//!   - Source registry with per-source failure isolation
//!   - Shippers and their HTTP transport
//!   - Scheduler and orchestrator driving collect-then-ship cycles
//!
//! * `logger` — `tracing` subscriber setup: console output in compact, pretty
//!   or JSON format and optional systemd journald.
//!
//! * `server` — `GET /health` liveness endpoint.
//!
//! * `shutdown` — Ctrl+C handling and background task reaping.
//!
//! ## Features
//!
//! * `journald` — Enables the systemd journal logging layer (default: enabled).

pub mod config;
pub mod core;
pub mod logger;
pub mod server;
pub mod shutdown;
