//! Configuration management
//!
//! Handles:
//! - MQTT broker settings and credentials
//! - Sparkplug identity (group id, edge node id)
//! - Publish interval and metric sources
//! - Reconnect retry policy
//!
//! Values come from the TOML config file (or defaults) and are then
//! overridden by command-line flags / `SPARKPLUG_*` environment variables.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::discovery;
use crate::error::{NodeError, Result};
use crate::retry::{Backoff, RetryPolicy};
use crate::topics::Identifier;

/// Node id value meaning "use the local host name"
pub const HOSTNAME_PLACEHOLDER: &str = "[Hostname]";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NodeConfig {
    pub mqtt: MqttConfig,
    pub node: NodeSettings,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub username: Option<String>,
    #[serde(skip_serializing)] // Never write passwords back
    pub password: Option<String>,
    pub keep_alive_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    pub group_id: String,
    /// Defaults to the local host name
    pub node_id: Option<String>,
    pub publish_interval_secs: u64,
    pub disk_path: PathBuf,
    pub max_provider_failures: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RetryConfig {
    /// Unlimited when unset
    pub max_attempts: Option<u32>,
    /// 0 retries immediately
    pub backoff_ms: u64,
    /// When set, the delay doubles from `backoff_ms` up to this cap
    pub max_backoff_ms: Option<u64>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
            keep_alive_secs: 30,
        }
    }
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            group_id: "Sparkplug_Devices".to_string(),
            node_id: None,
            publish_interval_secs: 5,
            disk_path: PathBuf::from("/"),
            max_provider_failures: 3,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        let backoff = match (self.backoff_ms, self.max_backoff_ms) {
            (0, _) => Backoff::None,
            (ms, None) => Backoff::Fixed(Duration::from_millis(ms)),
            (ms, Some(max)) => Backoff::Exponential {
                initial: Duration::from_millis(ms),
                max: Duration::from_millis(max.max(ms)),
            },
        };
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff,
        }
    }
}

/// Command-line flags. Every flag is optional and overrides the config file.
#[derive(Debug, Default, Parser)]
#[command(author, version, about = "Sparkplug B edge node publishing host telemetry")]
pub struct Cli {
    /// Config file (default: <config dir>/sparkplug-node/config.toml)
    #[arg(long, env = "SPARKPLUG_CONFIG")]
    pub config: Option<PathBuf>,

    /// MQTT broker host
    #[arg(long, env = "SPARKPLUG_HOST")]
    pub host: Option<String>,

    /// MQTT broker port
    #[arg(long, env = "SPARKPLUG_PORT")]
    pub port: Option<u16>,

    /// MQTT username
    #[arg(long, env = "SPARKPLUG_USERNAME")]
    pub username: Option<String>,

    /// MQTT password
    #[arg(long, env = "SPARKPLUG_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Send interval [seconds]
    #[arg(long, env = "SPARKPLUG_INTERVAL")]
    pub interval: Option<u64>,

    /// Sparkplug group id
    #[arg(long = "group_id", alias = "group-id", env = "SPARKPLUG_GROUP_ID")]
    pub group_id: Option<String>,

    /// Sparkplug edge node id (default: host name)
    #[arg(long = "node_id", alias = "node-id", env = "SPARKPLUG_NODE_ID")]
    pub node_id: Option<String>,
}

impl NodeConfig {
    /// Loads `path`, or the default location when `None`. A missing file
    /// yields the defaults.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::config_file_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(&path).await?;
        toml::from_str(&content)
            .map_err(|e| NodeError::Config(format!("{}: {}", path.display(), e)))
    }

    /// OS-specific config file path
    pub fn config_file_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("sparkplug-node");
        path.push("config.toml");
        Some(path)
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(host) = &cli.host {
            self.mqtt.broker_host = host.clone();
        }
        if let Some(port) = cli.port {
            self.mqtt.broker_port = port;
        }
        if let Some(username) = &cli.username {
            self.mqtt.username = Some(username.clone());
        }
        if let Some(password) = &cli.password {
            self.mqtt.password = Some(password.clone());
        }
        if let Some(interval) = cli.interval {
            self.node.publish_interval_secs = interval;
        }
        if let Some(group_id) = &cli.group_id {
            self.node.group_id = group_id.clone();
        }
        if let Some(node_id) = &cli.node_id {
            self.node.node_id = Some(node_id.clone());
        }
    }

    /// Resolved identity; an unset node id (or the `[Hostname]` placeholder)
    /// becomes the local host name.
    pub fn identifier(&self) -> Identifier {
        let node_id = match self.node.node_id.as_deref() {
            None | Some(HOSTNAME_PLACEHOLDER) => discovery::hostname(),
            Some(id) => id.to_string(),
        };
        Identifier::new(self.node.group_id.clone(), node_id)
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_secs(self.node.publish_interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.node.publish_interval_secs == 0 {
            return Err(NodeError::Config("publish interval must be > 0".to_string()));
        }
        if self.node.max_provider_failures == 0 {
            return Err(NodeError::Config("max_provider_failures must be > 0".to_string()));
        }
        let ident = self.identifier();
        for (field, value) in [("group_id", &ident.group_id), ("node_id", &ident.node_id)] {
            if value.is_empty() {
                return Err(NodeError::Config(format!("{field} must not be empty")));
            }
            if value.contains(['/', '+', '#']) {
                return Err(NodeError::Config(format!(
                    "{field} '{value}' must not contain '/', '+' or '#'"
                )));
            }
        }
        Ok(())
    }
}
