//! NBIRTH / NDATA / NDEATH payload construction
//!
//! All three payload kinds go through [`PayloadBuilder::build`]. Which metrics
//! a payload carries, and whether they carry names, is decided in one `match`:
//!
//! - Death: bdSeq of the current connection epoch only
//! - Data: CPU always, disk usage only when it changed since last emitted
//! - Birth: every metric, named, disk usage unconditionally
//!
//! Samples are read before a sequence number is allocated, so a failing
//! provider consumes no `seq`. The builder never writes the disk-usage cache:
//! the caller commits a [`Built`] once the transport has accepted it.

use std::path::Path;
use tracing::debug;

use crate::error::Result;
use crate::metrics::{Clock, MetricsProvider};
use crate::proto::{metric::Value, Metric, Payload};
use crate::schema::MetricKind;
use crate::state::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Birth,
    Data,
    Death,
}

/// Provider samples needed by one payload kind
enum Readings {
    Death,
    Data {
        cpu_percent: f32,
        disk_usage_percent: f32,
    },
    Birth {
        cpu_percent: f32,
        disk_usage_percent: f32,
        os: String,
        os_version: String,
    },
}

/// A payload ready to send and the disk usage it carries
#[derive(Debug, Clone, PartialEq)]
pub struct Built {
    pub payload: Payload,
    pub disk_usage_percent: Option<f32>,
}

impl Built {
    /// Records the carried disk usage as emitted
    pub fn commit(&self, state: &mut SessionState) {
        if let Some(percent) = self.disk_usage_percent {
            state.last_disk_usage_percent = Some(percent);
        }
    }
}

pub struct PayloadBuilder<'a> {
    provider: &'a dyn MetricsProvider,
    clock: &'a dyn Clock,
    disk_path: &'a Path,
}

impl<'a> PayloadBuilder<'a> {
    pub fn new(provider: &'a dyn MetricsProvider, clock: &'a dyn Clock, disk_path: &'a Path) -> Self {
        Self {
            provider,
            clock,
            disk_path,
        }
    }

    pub fn build(&self, kind: PayloadKind, state: &mut SessionState) -> Result<Built> {
        let readings = self.read(kind)?;

        let now = self.clock.now_millis();
        let seq = state.sequence.next_payload_seq();
        let mut metrics = Vec::new();
        let mut disk_usage = None;

        match readings {
            Readings::Death => {
                let bd_seq = state.current_bd_seq();
                metrics.push(metric(MetricKind::BdSeq, Value::IntValue(bd_seq), now, true));
            }
            Readings::Data {
                cpu_percent,
                disk_usage_percent,
            } => {
                metrics.push(metric(MetricKind::CpuPercent, Value::FloatValue(cpu_percent), now, false));
                if state.last_disk_usage_percent != Some(disk_usage_percent) {
                    disk_usage = Some(disk_usage_percent);
                    metrics.push(metric(MetricKind::DiskUsage, Value::FloatValue(disk_usage_percent), now, false));
                }
            }
            Readings::Birth {
                cpu_percent,
                disk_usage_percent,
                os,
                os_version,
            } => {
                let bd_seq = state.current_bd_seq();
                disk_usage = Some(disk_usage_percent);

                metrics.push(metric(MetricKind::BdSeq, Value::IntValue(bd_seq), now, true));
                metrics.push(metric(MetricKind::CpuPercent, Value::FloatValue(cpu_percent), now, true));
                metrics.push(metric(MetricKind::DiskUsage, Value::FloatValue(disk_usage_percent), now, true));
                metrics.push(metric(MetricKind::Rebirth, Value::BooleanValue(false), now, true));
                metrics.push(metric(MetricKind::Os, Value::StringValue(os), now, true));
                metrics.push(metric(MetricKind::OsVersion, Value::StringValue(os_version), now, true));
            }
        }

        debug!("Built {:?} payload seq={} with {} metrics", kind, seq, metrics.len());

        Ok(Built {
            payload: Payload {
                timestamp: Some(now),
                metrics,
                seq: Some(u64::from(seq)),
                ..Default::default()
            },
            disk_usage_percent: disk_usage,
        })
    }

    fn read(&self, kind: PayloadKind) -> Result<Readings> {
        let readings = match kind {
            PayloadKind::Death => Readings::Death,
            PayloadKind::Data => Readings::Data {
                cpu_percent: self.provider.cpu_percent()?,
                disk_usage_percent: self.provider.disk_usage_percent(self.disk_path)?,
            },
            PayloadKind::Birth => Readings::Birth {
                cpu_percent: self.provider.cpu_percent()?,
                disk_usage_percent: self.provider.disk_usage_percent(self.disk_path)?,
                os: self.provider.os_name()?,
                os_version: self.provider.os_version()?,
            },
        };
        Ok(readings)
    }
}

fn metric(kind: MetricKind, value: Value, timestamp: u64, named: bool) -> Metric {
    let def = kind.definition();
    Metric {
        name: named.then(|| def.name.to_string()),
        alias: def.emit_alias.then_some(def.alias),
        timestamp: Some(timestamp),
        datatype: Some(def.datatype.id()),
        value: Some(value),
        ..Default::default()
    }
}
