//! Parsers for the Linux procfs documents read by the system source.
//!
//! Parsing is kept separate from I/O so the formats can be tested against
//! captured file contents.

use std::collections::HashMap;

use super::{error::CollectorError, types::CollectorResult};

pub const PROC_STAT: &str = "/proc/stat";
pub const PROC_MEMINFO: &str = "/proc/meminfo";
pub const PROC_NET_DEV: &str = "/proc/net/dev";
pub const PROC_DISKSTATS: &str = "/proc/diskstats";
pub const PROC_MOUNTS: &str = "/proc/mounts";

/// Sector size used by `/proc/diskstats`, independent of the device.
const DISKSTATS_SECTOR_BYTES: u64 = 512;

/// Filesystems that never carry user data and are skipped for usage metrics.
const PSEUDO_FILESYSTEMS: &[&str] = &[
    "proc",
    "sysfs",
    "devtmpfs",
    "devpts",
    "tmpfs",
    "cgroup",
    "cgroup2",
    "securityfs",
    "debugfs",
    "tracefs",
    "configfs",
    "mqueue",
    "hugetlbfs",
    "bpf",
    "pstore",
    "overlay",
    "squashfs",
    "autofs",
    "binfmt_misc",
    "fusectl",
    "nsfs",
    "rpc_pipefs",
];

pub async fn read(path: &str) -> CollectorResult<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CollectorError::FileRead {
            path: path.to_string(),
            source,
        })
}

/// Cumulative jiffies spent by one CPU line of `/proc/stat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuTimes {
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }

    pub fn idle_total(&self) -> u64 {
        self.idle + self.iowait
    }

    /// Busy percentage between an earlier sample and this one.
    ///
    /// Returns 0 when no time has elapsed between the samples.
    pub fn usage_since(&self, earlier: &CpuTimes) -> f64 {
        let total = self.total().saturating_sub(earlier.total());
        if total == 0 {
            return 0.0;
        }
        let idle = self.idle_total().saturating_sub(earlier.idle_total());
        let busy = total.saturating_sub(idle);
        busy as f64 / total as f64 * 100.0
    }
}

/// CPU lines of `/proc/stat`, in file order. The aggregate line is labelled
/// `cpu`, per-core lines `cpu0`, `cpu1`, ...
pub fn parse_stat(content: &str) -> CollectorResult<Vec<(String, CpuTimes)>> {
    let mut cpus = Vec::new();

    for line in content.lines().filter(|l| l.starts_with("cpu")) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 8 {
            continue;
        }

        let field = |index: usize, metric: &str| -> CollectorResult<u64> {
            match parts.get(index) {
                Some(raw) => raw.parse::<u64>().map_err(|_| CollectorError::ParseError {
                    metric: metric.to_string(),
                    location: PROC_STAT.to_string(),
                    reason: format!("invalid value: {raw}"),
                }),
                None => Ok(0),
            }
        };

        cpus.push((
            parts[0].to_string(),
            CpuTimes {
                user: field(1, "user")?,
                nice: field(2, "nice")?,
                system: field(3, "system")?,
                idle: field(4, "idle")?,
                iowait: field(5, "iowait")?,
                irq: field(6, "irq")?,
                softirq: field(7, "softirq")?,
                steal: field(8, "steal")?,
            },
        ));
    }

    if cpus.is_empty() {
        return Err(CollectorError::InvalidFormat {
            location: PROC_STAT.to_string(),
            reason: "no cpu lines found".to_string(),
        });
    }

    Ok(cpus)
}

/// Memory figures from `/proc/meminfo`, converted to bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemInfo {
    pub total: u64,
    pub free: u64,
    pub available: u64,
    pub buffers: u64,
    pub cached: u64,
    pub swap_total: u64,
    pub swap_free: u64,
}

impl MemInfo {
    pub fn used(&self) -> u64 {
        self.total.saturating_sub(self.available)
    }

    pub fn swap_used(&self) -> u64 {
        self.swap_total.saturating_sub(self.swap_free)
    }
}

pub fn parse_meminfo(content: &str) -> CollectorResult<MemInfo> {
    let mut fields: HashMap<&str, u64> = HashMap::with_capacity(64);

    for line in content.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        if let Some(Ok(kib)) = rest.split_whitespace().next().map(str::parse::<u64>) {
            fields.insert(key.trim(), kib * 1024);
        }
    }

    let total = fields
        .get("MemTotal")
        .copied()
        .ok_or(CollectorError::MissingField {
            field: "MemTotal".to_string(),
            location: PROC_MEMINFO.to_string(),
        })?;
    let free = fields.get("MemFree").copied().unwrap_or(0);
    let buffers = fields.get("Buffers").copied().unwrap_or(0);
    let cached = fields.get("Cached").copied().unwrap_or(0);

    // Kernels before 3.14 do not report MemAvailable.
    let available = fields
        .get("MemAvailable")
        .copied()
        .unwrap_or(free + buffers + cached);

    Ok(MemInfo {
        total,
        free,
        available,
        buffers,
        cached,
        swap_total: fields.get("SwapTotal").copied().unwrap_or(0),
        swap_free: fields.get("SwapFree").copied().unwrap_or(0),
    })
}

/// Per-interface counters from `/proc/net/dev`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceCounters {
    pub interface: String,
    pub bytes_recv: u64,
    pub packets_recv: u64,
    pub errors_in: u64,
    pub drop_in: u64,
    pub bytes_sent: u64,
    pub packets_sent: u64,
    pub errors_out: u64,
    pub drop_out: u64,
}

pub fn parse_net_dev(content: &str) -> CollectorResult<Vec<InterfaceCounters>> {
    let mut interfaces = Vec::new();

    // The first two lines are column headers.
    for line in content.lines().skip(2) {
        let Some((name, values)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();

        let values: Vec<u64> = values
            .split_whitespace()
            .map(str::parse::<u64>)
            .collect::<Result<_, _>>()
            .map_err(|_| CollectorError::ParseError {
                metric: "network_stats".to_string(),
                location: format!("{PROC_NET_DEV} interface={name}"),
                reason: "failed to parse network counters".to_string(),
            })?;

        // receive: bytes packets errs drop fifo frame compressed multicast
        // transmit: bytes packets errs drop fifo colls carrier compressed
        if values.len() < 12 {
            continue;
        }

        interfaces.push(InterfaceCounters {
            interface: name.to_string(),
            bytes_recv: values[0],
            packets_recv: values[1],
            errors_in: values[2],
            drop_in: values[3],
            bytes_sent: values[8],
            packets_sent: values[9],
            errors_out: values[10],
            drop_out: values[11],
        });
    }

    Ok(interfaces)
}

/// Per-device I/O counters from `/proc/diskstats`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskCounters {
    pub device: String,
    pub read_count: u64,
    pub read_bytes: u64,
    pub write_count: u64,
    pub write_bytes: u64,
}

pub fn parse_diskstats(content: &str) -> Vec<DiskCounters> {
    content
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 10 {
                return None;
            }
            let device = parts[2];
            if device.starts_with("loop") || device.starts_with("ram") {
                return None;
            }
            let num = |i: usize| parts[i].parse::<u64>().ok();
            Some(DiskCounters {
                device: device.to_string(),
                read_count: num(3)?,
                read_bytes: num(5)? * DISKSTATS_SECTOR_BYTES,
                write_count: num(7)?,
                write_bytes: num(9)? * DISKSTATS_SECTOR_BYTES,
            })
        })
        .collect()
}

/// A mounted filesystem that carries real data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub device: String,
    pub mount_point: String,
    pub fs_type: String,
}

pub fn parse_mounts(content: &str) -> Vec<Mount> {
    content
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let device = parts.next()?;
            let mount_point = parts.next()?;
            let fs_type = parts.next()?;

            if PSEUDO_FILESYSTEMS.contains(&fs_type) || fs_type.starts_with("fuse.") {
                return None;
            }

            Some(Mount {
                device: device.to_string(),
                mount_point: unescape_mount_path(mount_point),
                fs_type: fs_type.to_string(),
            })
        })
        .collect()
}

/// `/proc/mounts` escapes whitespace in paths as octal sequences.
fn unescape_mount_path(raw: &str) -> String {
    raw.replace("\\040", " ")
        .replace("\\011", "\t")
        .replace("\\012", "\n")
        .replace("\\134", "\\")
}

/// Space usage of a mounted filesystem, in bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FsUsage {
    pub total: u64,
    pub free: u64,
    pub used: u64,
}

impl FsUsage {
    /// Builds usage from raw `statvfs` block counts.
    ///
    /// Blocks reserved for root count as neither used nor free, so `used`
    /// and `free` match what `df` reports for unprivileged users.
    pub fn from_blocks(blocks: u64, blocks_free: u64, blocks_avail: u64, fragment_size: u64) -> Self {
        Self {
            total: blocks.wrapping_mul(fragment_size),
            free: blocks_avail.wrapping_mul(fragment_size),
            used: blocks.saturating_sub(blocks_free).wrapping_mul(fragment_size),
        }
    }

    /// Share of the space available to unprivileged users that is in use.
    pub fn used_percent(&self) -> f64 {
        let usable = self.used.saturating_add(self.free);
        if usable == 0 {
            0.0
        } else {
            self.used as f64 / usable as f64 * 100.0
        }
    }
}

pub fn statvfs(mount_point: &str) -> CollectorResult<FsUsage> {
    let c_path =
        std::ffi::CString::new(mount_point.as_bytes()).map_err(|e| CollectorError::SystemCall {
            syscall: "statvfs".to_string(),
            reason: format!("invalid mount point '{mount_point}': {e}"),
        })?;

    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if result != 0 {
        return Err(CollectorError::SystemCall {
            syscall: "statvfs".to_string(),
            reason: std::io::Error::last_os_error().to_string(),
        });
    }

    Ok(FsUsage::from_blocks(
        stat.f_blocks as u64,
        stat.f_bfree as u64,
        stat.f_bavail as u64,
        stat.f_frsize as u64,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT: &str = "\
cpu  100 0 50 800 50 0 0 0 0 0
cpu0 60 0 20 400 20 0 0 0 0 0
cpu1 40 0 30 400 30 0 0 0 0 0
intr 12345
ctxt 67890
";

    #[test]
    fn stat_lines_are_parsed_in_order() {
        let cpus = parse_stat(STAT).unwrap();
        let labels: Vec<&str> = cpus.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["cpu", "cpu0", "cpu1"]);
        assert_eq!(cpus[1].1.user, 60);
        assert_eq!(cpus[0].1.total(), 1000);
    }

    #[test]
    fn stat_without_cpu_lines_is_rejected() {
        assert!(matches!(
            parse_stat("intr 1\n"),
            Err(CollectorError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn usage_is_busy_share_of_elapsed_time() {
        let earlier = CpuTimes {
            user: 100,
            idle: 100,
            ..Default::default()
        };
        let later = CpuTimes {
            user: 175,
            idle: 125,
            ..Default::default()
        };
        assert_eq!(later.usage_since(&earlier), 75.0);
        assert_eq!(earlier.usage_since(&earlier), 0.0);
    }

    #[test]
    fn meminfo_is_converted_to_bytes() {
        let content = "\
MemTotal:       16000 kB
MemFree:         4000 kB
MemAvailable:   10000 kB
Buffers:         1000 kB
Cached:          2000 kB
SwapTotal:       8000 kB
SwapFree:        6000 kB
";
        let mem = parse_meminfo(content).unwrap();
        assert_eq!(mem.total, 16000 * 1024);
        assert_eq!(mem.used(), 6000 * 1024);
        assert_eq!(mem.swap_used(), 2000 * 1024);
    }

    #[test]
    fn meminfo_without_available_falls_back() {
        let mem = parse_meminfo("MemTotal: 100 kB\nMemFree: 10 kB\nBuffers: 5 kB\nCached: 5 kB\n")
            .unwrap();
        assert_eq!(mem.available, 20 * 1024);
    }

    #[test]
    fn meminfo_requires_total() {
        assert!(matches!(
            parse_meminfo("MemFree: 10 kB\n"),
            Err(CollectorError::MissingField { .. })
        ));
    }

    #[test]
    fn net_dev_maps_receive_and_transmit_columns() {
        let content = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
  eth0: 1000 10 1 2 0 0 0 0 2000 20 3 4 0 0 0 0
    lo: 500 5 0 0 0 0 0 0 500 5 0 0 0 0 0 0
";
        let ifaces = parse_net_dev(content).unwrap();
        assert_eq!(ifaces.len(), 2);
        assert_eq!(ifaces[0].interface, "eth0");
        assert_eq!(ifaces[0].bytes_recv, 1000);
        assert_eq!(ifaces[0].drop_in, 2);
        assert_eq!(ifaces[0].bytes_sent, 2000);
        assert_eq!(ifaces[0].drop_out, 4);
    }

    #[test]
    fn diskstats_skips_virtual_devices() {
        let content = "\
   7       0 loop0 10 0 20 0 0 0 0 0 0 0 0
   8       0 sda 100 5 2000 30 50 2 1000 10 0 40 40
";
        let disks = parse_diskstats(content);
        assert_eq!(disks.len(), 1);
        assert_eq!(disks[0].device, "sda");
        assert_eq!(disks[0].read_count, 100);
        assert_eq!(disks[0].read_bytes, 2000 * 512);
        assert_eq!(disks[0].write_count, 50);
        assert_eq!(disks[0].write_bytes, 1000 * 512);
    }

    #[test]
    fn mounts_skip_pseudo_filesystems() {
        let content = "\
proc /proc proc rw 0 0
/dev/sda1 / ext4 rw 0 0
tmpfs /run tmpfs rw 0 0
/dev/sdb1 /mnt/my\\040disk xfs rw 0 0
gvfsd-fuse /run/user/1000/gvfs fuse.gvfsd-fuse rw 0 0
";
        let mounts = parse_mounts(content);
        assert_eq!(mounts.len(), 2);
        assert_eq!(mounts[0].mount_point, "/");
        assert_eq!(mounts[1].mount_point, "/mnt/my disk");
        assert_eq!(mounts[1].fs_type, "xfs");
    }

    #[test]
    fn fs_usage_percent_handles_empty_filesystems() {
        let empty = FsUsage {
            total: 0,
            free: 0,
            used: 0,
        };
        assert_eq!(empty.used_percent(), 0.0);

        let half = FsUsage {
            total: 200,
            free: 100,
            used: 100,
        };
        assert_eq!(half.used_percent(), 50.0);
    }

    #[test]
    fn reserved_blocks_are_neither_used_nor_free() {
        let usage = FsUsage::from_blocks(100, 10, 5, 4096);

        assert_eq!(usage.total, 100 * 4096);
        assert_eq!(usage.used, 90 * 4096);
        assert_eq!(usage.free, 5 * 4096);
        assert!((usage.used_percent() - 90.0 / 95.0 * 100.0).abs() < 1e-9);
    }
}
