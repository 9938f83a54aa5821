use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{traits::Source, types::CollectorResult};
use crate::{config::metrics::MetricsConfig, core::metric::Batch};

/// The set of sources polled on every cycle.
///
/// The registry is populated during startup and treated as read-only once the
/// orchestrator is running. Collection is partial-failure tolerant: a source
/// that returns an error is logged and skipped, it never blanks out the
/// metrics of healthy sources.
#[derive(Default, Clone)]
pub struct Registry {
    sources: Vec<Arc<dyn Source>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a source. Sources are not deduplicated: registering the same
    /// source twice makes it contribute twice per cycle.
    pub fn register(&mut self, source: Arc<dyn Source>) {
        debug!(source = source.name(), "Registering metric source");
        self.sources.push(source);
    }

    /// Collects from every source in registration order.
    ///
    /// Always returns a batch, possibly empty. Source errors are absorbed here.
    pub async fn collect_all(&self, ctx: &CancellationToken) -> Batch {
        let mut outcomes = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            outcomes.push((source.name(), source.collect(ctx).await));
        }

        outcomes.into_iter().fold(Batch::new(), absorb)
    }

    /// Names of the registered sources, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.iter().any(|s| s.name() == name)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Registers every source enabled in `config`: system first, then HTTP.
    ///
    /// # Errors
    ///
    /// Fails if a source cannot be constructed, e.g. its HTTP client.
    pub fn from_config(config: &MetricsConfig) -> CollectorResult<Self> {
        let mut registry = Self::new();

        if config.system.enabled {
            #[cfg(target_os = "linux")]
            registry.register(Arc::new(super::system::SystemSource::new(config.system.clone())));

            #[cfg(not(target_os = "linux"))]
            warn!(
                error = %super::CollectorError::UnsupportedCollector("system".into()),
                "System source requires Linux procfs, not registering it"
            );
        }

        if config.http.is_enabled() {
            registry.register(Arc::new(super::http::HttpSource::new(
                config.http.endpoints.clone(),
                config.http.timeout(),
            )?));
        }

        Ok(registry)
    }
}

/// Fold step: keeps the metrics of a successful source, logs and drops a failure.
fn absorb(mut batch: Batch, (name, outcome): (&str, CollectorResult<Batch>)) -> Batch {
    match outcome {
        Ok(metrics) => {
            debug!(source = name, metric_count = metrics.len(), "Source collected");
            batch.extend(metrics);
        }
        Err(e) => {
            warn!(source = name, error = %e, "Source failed, skipping for this cycle");
        }
    }
    batch
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tracing_test::traced_test;

    use super::*;
    use crate::core::{collectors::error::CollectorError, metric::Metric};

    struct FixedSource {
        name: &'static str,
        metrics: Batch,
        calls: AtomicUsize,
    }

    impl FixedSource {
        fn new(name: &'static str, values: &[f64]) -> Self {
            Self {
                name,
                metrics: values
                    .iter()
                    .map(|v| Metric::gauge(format!("{name}_value"), *v))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Source for FixedSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn collect(&self, _ctx: &CancellationToken) -> CollectorResult<Batch> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.metrics.clone())
        }
    }

    struct FailingSource(&'static str);

    #[async_trait]
    impl Source for FailingSource {
        fn name(&self) -> &str {
            self.0
        }

        async fn collect(&self, _ctx: &CancellationToken) -> CollectorResult<Batch> {
            Err(CollectorError::InvalidFormat {
                location: "test".into(),
                reason: "boom".into(),
            })
        }
    }

    fn values(batch: &Batch) -> Vec<f64> {
        batch.iter().map(|m| m.value).collect()
    }

    mod collect_tests {
        use super::*;

        #[tokio::test]
        async fn empty_registry_yields_empty_batch() {
            let registry = Registry::new();
            let batch = registry.collect_all(&CancellationToken::new()).await;
            assert!(batch.is_empty());
        }

        #[tokio::test]
        async fn successes_are_concatenated_in_registration_order() {
            let mut registry = Registry::new();
            registry.register(Arc::new(FixedSource::new("a", &[1.0, 2.0])));
            registry.register(Arc::new(FixedSource::new("b", &[3.0])));
            registry.register(Arc::new(FixedSource::new("c", &[4.0, 5.0])));

            let batch = registry.collect_all(&CancellationToken::new()).await;
            assert_eq!(values(&batch), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
            assert_eq!(batch[2].name, "b_value");
        }

        #[tokio::test]
        #[traced_test]
        async fn failing_sources_are_isolated() {
            let mut registry = Registry::new();
            registry.register(Arc::new(FailingSource("broken_first")));
            registry.register(Arc::new(FixedSource::new("a", &[1.0])));
            registry.register(Arc::new(FailingSource("broken_middle")));
            registry.register(Arc::new(FixedSource::new("b", &[2.0, 3.0])));
            registry.register(Arc::new(FailingSource("broken_last")));

            let batch = registry.collect_all(&CancellationToken::new()).await;

            assert_eq!(values(&batch), vec![1.0, 2.0, 3.0]);
            assert!(logs_contain("broken_middle"));
            assert!(logs_contain("Source failed"));
        }

        #[tokio::test]
        async fn all_failing_yields_empty_batch() {
            let mut registry = Registry::new();
            registry.register(Arc::new(FailingSource("x")));
            registry.register(Arc::new(FailingSource("y")));

            let batch = registry.collect_all(&CancellationToken::new()).await;
            assert!(batch.is_empty());
        }

        #[tokio::test]
        async fn duplicate_registration_contributes_twice() {
            let source = Arc::new(FixedSource::new("dup", &[7.0]));
            let mut registry = Registry::new();
            registry.register(source.clone());
            registry.register(source.clone());

            let batch = registry.collect_all(&CancellationToken::new()).await;
            assert_eq!(values(&batch), vec![7.0, 7.0]);
            assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        }
    }

    mod diagnostics_tests {
        use super::*;
        use crate::config::metrics::HttpEndpoint;

        #[test]
        fn names_follow_registration_order() {
            let mut registry = Registry::new();
            assert!(registry.is_empty());

            registry.register(Arc::new(FixedSource::new("system", &[])));
            registry.register(Arc::new(FailingSource("http")));

            assert_eq!(registry.len(), 2);
            assert_eq!(registry.names(), vec!["system", "http"]);
            assert!(registry.contains("http"));
            assert!(!registry.contains("disk"));
        }

        #[test]
        fn from_config_registers_enabled_sources() {
            let mut config = MetricsConfig::default();
            config.http.endpoints.push(HttpEndpoint {
                name: "api".into(),
                url: "http://127.0.0.1:1/stats".into(),
            });

            let registry = Registry::from_config(&config).unwrap();
            assert!(registry.contains("http"));
            assert_eq!(registry.contains("system"), cfg!(target_os = "linux"));

            config.system.enabled = false;
            config.http.endpoints.clear();
            assert!(Registry::from_config(&config).unwrap().is_empty());
        }
    }
}
