/// Metric sources and the registry that polls them.
pub mod collectors;

/// Metric data model.
pub mod metric;

/// Periodic collect-then-ship loop.
pub mod orchestrator;

/// Tick source and single-flight guard.
pub mod scheduler;

/// JSON and remote-write backends.
pub mod shipper;
