//! Sparkplug B edge node
//!
//! Publishes the presence and telemetry of the host over MQTT:
//! - NBIRTH on every connection, defining every metric with its alias
//! - NDATA every interval with CPU load and (changed) disk usage
//! - NDEATH registered as MQTT last will before every connection attempt
//! - Rebirth on the `Node Control/Rebirth` NCMD

pub mod config;
pub mod discovery;
pub mod error;
pub mod metrics;
pub mod mqtt;
pub mod node;
pub mod payload;
pub mod proto;
pub mod retry;
pub mod schema;
pub mod sequence;
pub mod session;
pub mod state;
pub mod topics;
pub mod transport;

pub use config::{Cli, NodeConfig};
pub use error::{NodeError, Result};
pub use metrics::{Clock, MetricsProvider, SystemClock};
pub use node::Node;
pub use payload::{PayloadBuilder, PayloadKind};
pub use proto::{Metric, Payload};
pub use retry::{Backoff, RetryPolicy};
pub use session::{Session, SessionOptions};
pub use state::{ConnectionState, SessionState};
pub use topics::Identifier;
pub use transport::Transport;
