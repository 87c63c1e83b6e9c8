/*!
Helpers pour inspecter les payloads Sparkplug publiés et construire des NCMD

- Décodage des bytes capturés par le mock
- Accès typé aux métriques connues (bdSeq, CPU, disque)
- Construction de commandes entrantes (rebirth par nom, par alias, autres)
*/

use anyhow::Result;
use sparkplug_node::proto::metric::Value;
use sparkplug_node::schema::{
    ALIAS_CPU_PERCENT, ALIAS_DISK_USAGE, ALIAS_REBIRTH, METRIC_NAME_BDSEQ, METRIC_NAME_REBIRTH,
};
use sparkplug_node::{Metric, Payload};

pub fn decode(bytes: &[u8]) -> Result<Payload> {
    Ok(Payload::from_bytes(bytes)?)
}

/// Typed accessors over a decoded payload
pub trait PayloadExt {
    fn bd_seq(&self) -> Option<u32>;
    fn cpu_percent(&self) -> Option<f32>;
    fn disk_usage(&self) -> Option<f32>;
    fn seq_u8(&self) -> Option<u8>;
    fn has_names(&self) -> bool;
}

impl PayloadExt for Payload {
    fn bd_seq(&self) -> Option<u32> {
        match self.metric_named(METRIC_NAME_BDSEQ)?.value {
            Some(Value::IntValue(v)) => Some(v),
            _ => None,
        }
    }

    fn cpu_percent(&self) -> Option<f32> {
        float_value(self.metric_with_alias(ALIAS_CPU_PERCENT)?)
    }

    fn disk_usage(&self) -> Option<f32> {
        float_value(self.metric_with_alias(ALIAS_DISK_USAGE)?)
    }

    fn seq_u8(&self) -> Option<u8> {
        self.seq.and_then(|s| u8::try_from(s).ok())
    }

    fn has_names(&self) -> bool {
        self.metrics.iter().any(|m| m.name.is_some())
    }
}

fn float_value(metric: &Metric) -> Option<f32> {
    match metric.value {
        Some(Value::FloatValue(v)) => Some(v),
        _ => None,
    }
}

/// Builds NCMD payloads as a primary application would send them
#[derive(Default)]
pub struct CommandBuilder {
    metrics: Vec<Metric>,
}

impl CommandBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Node Control/Rebirth = true`, addressed by name
    pub fn rebirth(mut self) -> Self {
        self.metrics.push(Metric {
            name: Some(METRIC_NAME_REBIRTH.to_string()),
            datatype: Some(11),
            value: Some(Value::BooleanValue(true)),
            ..Default::default()
        });
        self
    }

    /// Rebirth addressed by the reserved alias only
    pub fn rebirth_by_alias(mut self) -> Self {
        self.metrics.push(Metric {
            alias: Some(ALIAS_REBIRTH),
            datatype: Some(11),
            value: Some(Value::BooleanValue(true)),
            ..Default::default()
        });
        self
    }

    pub fn boolean(mut self, name: &str, value: bool) -> Self {
        self.metrics.push(Metric {
            name: Some(name.to_string()),
            datatype: Some(11),
            value: Some(Value::BooleanValue(value)),
            ..Default::default()
        });
        self
    }

    pub fn build(self) -> Payload {
        Payload {
            timestamp: Some(0),
            metrics: self.metrics,
            seq: None,
            ..Default::default()
        }
    }

    pub fn to_bytes(self) -> Vec<u8> {
        self.build().to_bytes()
    }
}
