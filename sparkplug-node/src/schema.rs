//! Static metric table of the node
//!
//! Every metric the node can emit is declared here with a stable alias and a
//! Sparkplug datatype. Names only travel in NBIRTH; NDATA refers to metrics
//! by alias alone.

/// Sparkplug B datatype tags (values from `sparkplug_b.proto`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    UInt32,
    Float,
    Boolean,
    String,
}

impl DataType {
    pub fn id(self) -> u32 {
        match self {
            DataType::UInt32 => 7,
            DataType::Float => 9,
            DataType::Boolean => 11,
            DataType::String => 12,
        }
    }
}

/// Metrics known to the node, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    BdSeq,
    CpuPercent,
    DiskUsage,
    Rebirth,
    Os,
    OsVersion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDefinition {
    pub kind: MetricKind,
    pub alias: u64,
    pub datatype: DataType,
    pub name: &'static str,
    /// Whether the alias goes on the wire. The rebirth command is matched by
    /// name on inbound NCMD, so its alias is reserved but never emitted.
    pub emit_alias: bool,
}

pub const ALIAS_BDSEQ: u64 = 1;
pub const ALIAS_CPU_PERCENT: u64 = 2;
pub const ALIAS_DISK_USAGE: u64 = 3;
pub const ALIAS_REBIRTH: u64 = 4;
pub const ALIAS_OS: u64 = 5;
pub const ALIAS_OS_VERSION: u64 = 6;

pub const METRIC_NAME_BDSEQ: &str = "bdSeq";
pub const METRIC_NAME_CPU_PERCENT: &str = "System/CpuPercent";
pub const METRIC_NAME_DISK_USAGE: &str = "System/DiskUsage";
pub const METRIC_NAME_REBIRTH: &str = "Node Control/Rebirth";
pub const METRIC_NAME_OS: &str = "Properties/OS";
pub const METRIC_NAME_OS_VERSION: &str = "Properties/OS Version";

pub const SCHEMA: [MetricDefinition; 6] = [
    MetricDefinition {
        kind: MetricKind::BdSeq,
        alias: ALIAS_BDSEQ,
        datatype: DataType::UInt32,
        name: METRIC_NAME_BDSEQ,
        emit_alias: true,
    },
    MetricDefinition {
        kind: MetricKind::CpuPercent,
        alias: ALIAS_CPU_PERCENT,
        datatype: DataType::Float,
        name: METRIC_NAME_CPU_PERCENT,
        emit_alias: true,
    },
    MetricDefinition {
        kind: MetricKind::DiskUsage,
        alias: ALIAS_DISK_USAGE,
        datatype: DataType::Float,
        name: METRIC_NAME_DISK_USAGE,
        emit_alias: true,
    },
    MetricDefinition {
        kind: MetricKind::Rebirth,
        alias: ALIAS_REBIRTH,
        datatype: DataType::Boolean,
        name: METRIC_NAME_REBIRTH,
        emit_alias: false,
    },
    MetricDefinition {
        kind: MetricKind::Os,
        alias: ALIAS_OS,
        datatype: DataType::String,
        name: METRIC_NAME_OS,
        emit_alias: true,
    },
    MetricDefinition {
        kind: MetricKind::OsVersion,
        alias: ALIAS_OS_VERSION,
        datatype: DataType::String,
        name: METRIC_NAME_OS_VERSION,
        emit_alias: true,
    },
];

impl MetricKind {
    pub fn definition(self) -> &'static MetricDefinition {
        // SCHEMA is declared in enum order
        &SCHEMA[self as usize]
    }
}

pub fn by_alias(alias: u64) -> Option<&'static MetricDefinition> {
    SCHEMA.iter().find(|d| d.alias == alias)
}

pub fn by_name(name: &str) -> Option<&'static MetricDefinition> {
    SCHEMA.iter().find(|d| d.name == name)
}
