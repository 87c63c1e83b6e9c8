//! Runtime wiring of the edge node: one session, the rumqttc event loop task
//! and the NDATA timer, until Ctrl-C or a fatal error.

use rumqttc::EventLoop;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::NodeConfig;
use crate::discovery::SystemInfo;
use crate::error::{NodeError, Result};
use crate::metrics::{SysinfoProvider, SystemClock};
use crate::mqtt::{self, MqttTransport};
use crate::session::{publish_loop, Session, SessionOptions};

/// Time allowed for NDEATH and DISCONNECT to leave on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

pub type MqttSession = Session<MqttTransport, SysinfoProvider, SystemClock>;

pub struct Node {
    session: Arc<MqttSession>,
    eventloop: EventLoop,
    interval: Duration,
    max_provider_failures: u32,
}

impl Node {
    pub fn new(config: &NodeConfig) -> Result<Self> {
        config.validate()?;

        let ident = config.identifier();
        let system_info = SystemInfo::discover();
        let (transport, eventloop) = MqttTransport::new(&config.mqtt, &ident.node_id);

        info!(
            "Node {} -> mqtt://{}:{}",
            ident, config.mqtt.broker_host, config.mqtt.broker_port
        );

        let session = Session::new(
            ident,
            transport,
            SysinfoProvider::new(system_info),
            SystemClock,
            SessionOptions {
                disk_path: config.node.disk_path.clone(),
                retry: config.retry.policy(),
            },
        );

        Ok(Self {
            session: Arc::new(session),
            eventloop,
            interval: config.publish_interval(),
            max_provider_failures: config.node.max_provider_failures,
        })
    }

    pub fn session(&self) -> &MqttSession {
        &self.session
    }

    pub async fn run(self) -> Result<()> {
        let Node {
            session,
            eventloop,
            interval,
            max_provider_failures,
        } = self;

        // The first CONNECT must already carry NDEATH
        session.arm_death()?;

        let mut driver = {
            let session = session.clone();
            let mut eventloop = eventloop;
            tokio::spawn(async move { mqtt::drive(&*session, &mut eventloop).await })
        };

        info!("Publishing data every {}s", interval.as_secs());

        tokio::select! {
            res = publish_loop(&*session, interval, max_provider_failures) => res,
            res = &mut driver => flatten(res),
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                if let Err(e) = session.shutdown() {
                    warn!("Failed to shut down cleanly: {}", e);
                }
                match tokio::time::timeout(SHUTDOWN_GRACE, &mut driver).await {
                    Ok(res) => flatten(res),
                    Err(_) => {
                        warn!("Event loop did not stop within {:?}", SHUTDOWN_GRACE);
                        driver.abort();
                        Ok(())
                    }
                }
            }
        }
    }
}

fn flatten(res: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    res.map_err(|e| NodeError::Transport(format!("event loop task failed: {e}")))?
}
