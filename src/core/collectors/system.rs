//! Host statistics read from the Linux procfs.
//!
//! The source is split into independent groups (cpu, memory, disk, network).
//! A failing group is dropped for the current cycle; the source itself only
//! fails when every enabled group fails or the cycle is cancelled.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{
    error::CollectorError,
    procfs::{self, PROC_DISKSTATS, PROC_MEMINFO, PROC_MOUNTS, PROC_NET_DEV, PROC_STAT},
    traits::Source,
    types::CollectorResult,
};
use crate::{
    config::metrics::SystemConfig,
    core::metric::{Batch, Labels, Metric},
};

pub struct SystemSource {
    config: SystemConfig,
}

impl SystemSource {
    pub fn new(config: SystemConfig) -> Self {
        Self { config }
    }

    fn cpu_window(&self) -> Duration {
        Duration::from_millis(self.config.cpu_sample_window_ms)
    }

    /// Utilisation is derived from two `/proc/stat` samples taken one window apart.
    async fn collect_cpu(&self, ctx: &CancellationToken) -> CollectorResult<Batch> {
        let first = procfs::parse_stat(&procfs::read(PROC_STAT).await?)?;

        tokio::select! {
            _ = ctx.cancelled() => return Err(CollectorError::Cancelled),
            _ = tokio::time::sleep(self.cpu_window()) => {}
        }

        let second = procfs::parse_stat(&procfs::read(PROC_STAT).await?)?;

        let mut batch = Batch::with_capacity(second.len() + 1);
        let mut cores = 0usize;

        for (label, now) in &second {
            let Some((_, before)) = first.iter().find(|(l, _)| l == label) else {
                continue;
            };
            let usage = now.usage_since(before);

            match label.strip_prefix("cpu").filter(|core| !core.is_empty()) {
                Some(core) => {
                    cores += 1;
                    batch.push(
                        Metric::gauge("system_cpu_usage_percent", usage).with_label("core", core),
                    );
                }
                None => batch.push(Metric::gauge("system_cpu_usage_total_percent", usage)),
            }
        }

        batch.push(Metric::gauge("system_cpu_count", cores as f64));
        Ok(batch)
    }

    async fn collect_memory(&self) -> CollectorResult<Batch> {
        let mem = procfs::parse_meminfo(&procfs::read(PROC_MEMINFO).await?)?;

        let mut batch = vec![
            Metric::gauge("system_memory_total_bytes", mem.total as f64),
            Metric::gauge("system_memory_used_bytes", mem.used() as f64),
            Metric::gauge("system_memory_available_bytes", mem.available as f64),
            Metric::gauge(
                "system_memory_usage_percent",
                percent(mem.used(), mem.total),
            ),
        ];

        if mem.swap_total > 0 {
            batch.extend([
                Metric::gauge("system_swap_total_bytes", mem.swap_total as f64),
                Metric::gauge("system_swap_used_bytes", mem.swap_used() as f64),
                Metric::gauge(
                    "system_swap_usage_percent",
                    percent(mem.swap_used(), mem.swap_total),
                ),
            ]);
        }

        Ok(batch)
    }

    async fn collect_disk(&self) -> CollectorResult<Batch> {
        let mounts = procfs::parse_mounts(&procfs::read(PROC_MOUNTS).await?);
        let mut batch = Batch::with_capacity(mounts.len() * 4);

        for mount in mounts {
            let usage = match procfs::statvfs(&mount.mount_point) {
                Ok(usage) => usage,
                Err(e) => {
                    trace!(mountpoint = %mount.mount_point, error = %e, "Skipping mount");
                    continue;
                }
            };

            let labels = Labels::from([
                ("device".to_string(), mount.device),
                ("mountpoint".to_string(), mount.mount_point),
                ("fstype".to_string(), mount.fs_type),
            ]);

            batch.extend([
                Metric::gauge("system_disk_total_bytes", usage.total as f64)
                    .with_labels(labels.clone()),
                Metric::gauge("system_disk_used_bytes", usage.used as f64)
                    .with_labels(labels.clone()),
                Metric::gauge("system_disk_free_bytes", usage.free as f64)
                    .with_labels(labels.clone()),
                Metric::gauge("system_disk_usage_percent", usage.used_percent())
                    .with_labels(labels),
            ]);
        }

        // I/O counters are best effort; usage figures are still useful without them.
        match procfs::read(PROC_DISKSTATS).await {
            Ok(content) => {
                for disk in procfs::parse_diskstats(&content) {
                    let device = disk.device.as_str();
                    batch.extend([
                        Metric::counter("system_disk_read_bytes_total", disk.read_bytes as f64)
                            .with_label("device", device),
                        Metric::counter("system_disk_write_bytes_total", disk.write_bytes as f64)
                            .with_label("device", device),
                        Metric::counter("system_disk_read_count_total", disk.read_count as f64)
                            .with_label("device", device),
                        Metric::counter("system_disk_write_count_total", disk.write_count as f64)
                            .with_label("device", device),
                    ]);
                }
            }
            Err(e) => debug!(error = %e, "Disk I/O counters unavailable"),
        }

        Ok(batch)
    }

    async fn collect_network(&self) -> CollectorResult<Batch> {
        let interfaces = procfs::parse_net_dev(&procfs::read(PROC_NET_DEV).await?)?;
        let mut batch = Batch::with_capacity(interfaces.len() * 8);

        for iface in &interfaces {
            let name = iface.interface.as_str();
            let counters = [
                ("system_network_bytes_sent_total", iface.bytes_sent),
                ("system_network_bytes_recv_total", iface.bytes_recv),
                ("system_network_packets_sent_total", iface.packets_sent),
                ("system_network_packets_recv_total", iface.packets_recv),
                ("system_network_errors_in_total", iface.errors_in),
                ("system_network_errors_out_total", iface.errors_out),
                ("system_network_drop_in_total", iface.drop_in),
                ("system_network_drop_out_total", iface.drop_out),
            ];
            batch.extend(
                counters
                    .into_iter()
                    .map(|(metric, value)| Metric::counter(metric, value as f64).with_label("interface", name)),
            );
        }

        Ok(batch)
    }
}

#[async_trait::async_trait]
impl Source for SystemSource {
    fn name(&self) -> &str {
        "system"
    }

    async fn collect(&self, ctx: &CancellationToken) -> CollectorResult<Batch> {
        let mut batch = Batch::new();
        let mut enabled = 0usize;
        let mut failed = 0usize;

        let mut absorb = |group: &str, outcome: CollectorResult<Batch>| match outcome {
            Ok(metrics) => {
                trace!(group, metric_count = metrics.len(), "System group collected");
                batch.extend(metrics);
            }
            Err(e) => {
                debug!(group, error = %e, "System group failed");
                failed += 1;
            }
        };

        if self.config.cpu {
            enabled += 1;
            match self.collect_cpu(ctx).await {
                Err(CollectorError::Cancelled) => return Err(CollectorError::Cancelled),
                outcome => absorb("cpu", outcome),
            }
        }
        if self.config.memory {
            enabled += 1;
            absorb("memory", self.collect_memory().await);
        }
        if self.config.disk {
            enabled += 1;
            absorb("disk", self.collect_disk().await);
        }
        if self.config.network {
            enabled += 1;
            absorb("network", self.collect_network().await);
        }

        if enabled > 0 && failed == enabled {
            return Err(CollectorError::AllGroupsFailed(enabled));
        }

        Ok(batch)
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
