//! System metrics sources for the node
//!
//! Provides:
//! - The `MetricsProvider` capability consumed by the payload builder
//! - A sysinfo-backed implementation (CPU load, OS identity), with disk usage
//!   from `statvfs` on Unix
//! - The `Clock` used to timestamp payloads

use parking_lot::Mutex;
use std::path::Path;
use sysinfo::System;
use tracing::debug;

use crate::discovery::SystemInfo;
use crate::error::{NodeError, Result};

/// Source of the samples carried by NBIRTH and NDATA
pub trait MetricsProvider: Send + Sync {
    /// Global CPU load, 0..100
    fn cpu_percent(&self) -> Result<f32>;

    /// Used share of the filesystem holding `path`, 0..100
    fn disk_usage_percent(&self, path: &Path) -> Result<f32>;

    fn os_name(&self) -> Result<String>;

    fn os_version(&self) -> Result<String>;
}

/// Milliseconds since the Unix epoch
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Cross-platform provider built on sysinfo
pub struct SysinfoProvider {
    sys: Mutex<System>,
    info: SystemInfo,
}

impl SysinfoProvider {
    pub fn new(info: SystemInfo) -> Self {
        let mut sys = System::new();
        // CPU usage is a delta between two refreshes; take the baseline now
        sys.refresh_cpu_usage();
        Self {
            sys: Mutex::new(sys),
            info,
        }
    }
}

impl MetricsProvider for SysinfoProvider {
    fn cpu_percent(&self) -> Result<f32> {
        let mut sys = self.sys.lock();
        sys.refresh_cpu_usage();
        let percent = sys.global_cpu_info().cpu_usage();
        debug!("CPU usage: {:.1}%", percent);
        Ok(percent)
    }

    fn disk_usage_percent(&self, path: &Path) -> Result<f32> {
        let (used, available) = disk_space(path)?;
        let percent = usage_percent(used, available).ok_or_else(|| {
            NodeError::Provider(format!("filesystem holding {} reports zero size", path.display()))
        })?;

        debug!("Disk usage of {}: {:.1}%", path.display(), percent);
        Ok(percent)
    }

    fn os_name(&self) -> Result<String> {
        Ok(self.info.os.clone())
    }

    fn os_version(&self) -> Result<String> {
        Ok(self.info.os_version.clone())
    }
}

/// Used share of a filesystem as `df` reports it: blocks reserved for root
/// count neither as used nor as available. Rounded to one decimal, so NDATA
/// only repeats the metric on a visible change.
pub fn usage_percent(used: u64, available: u64) -> Option<f32> {
    let usable = used.checked_add(available)?;
    if usable == 0 {
        return None;
    }
    let percent = (used as f64 / usable as f64 * 100.0) as f32;
    Some((percent * 10.0).round() / 10.0)
}

/// (used, available) in blocks of the filesystem holding `path`
#[cfg(unix)]
fn disk_space(path: &Path) -> Result<(u64, u64)> {
    let stat = nix::sys::statvfs::statvfs(path)
        .map_err(|e| NodeError::Provider(format!("statvfs {}: {}", path.display(), e)))?;
    let used = u64::from(stat.blocks()).saturating_sub(u64::from(stat.blocks_free()));
    Ok((used, u64::from(stat.blocks_available())))
}

/// (used, available) in bytes of the disk with the longest mount point
/// prefixing `path`. Reserved space is not visible here and counts as used.
#[cfg(not(unix))]
fn disk_space(path: &Path) -> Result<(u64, u64)> {
    let disks = sysinfo::Disks::new_with_refreshed_list();
    let disk = disks
        .list()
        .iter()
        .filter(|d| path.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().as_os_str().len())
        .ok_or_else(|| {
            NodeError::Provider(format!("no mounted filesystem holds {}", path.display()))
        })?;

    let available = disk.available_space();
    Ok((disk.total_space().saturating_sub(available), available))
}
