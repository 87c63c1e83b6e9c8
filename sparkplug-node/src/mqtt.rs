//! rumqttc transport adapter and event loop driver
//!
//! rumqttc reconnects by itself on the next `poll()` after an error, using the
//! `MqttOptions` held by the event loop. The last will armed by the session is
//! therefore copied into those options before every poll made while not
//! connected, so each new CONNECT carries the current NDEATH.

use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, Incoming, LastWill,
    MqttOptions, QoS,
};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::MqttConfig;
use crate::error::{NodeError, Result};
use crate::metrics::{Clock, MetricsProvider};
use crate::retry::Retry;
use crate::session::Session;
use crate::state::{new_state, Shared};
use crate::transport::Transport;

/// Sparkplug node messages are sent with QoS 0, not retained
const QOS: QoS = QoS::AtMostOnce;

#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
    last_will: Shared<Option<LastWill>>,
}

impl MqttTransport {
    /// Creates the client and its event loop. Nothing touches the network
    /// until the event loop is polled.
    pub fn new(config: &MqttConfig, client_id: &str) -> (Self, EventLoop) {
        let mut options = MqttOptions::new(client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        options.set_clean_session(true);
        if let Some(username) = &config.username {
            options.set_credentials(username, config.password.as_deref().unwrap_or(""));
        }

        let (client, eventloop) = AsyncClient::new(options, 10);
        let transport = Self {
            client,
            last_will: new_state(None),
        };
        (transport, eventloop)
    }

    /// Last will to present on the next CONNECT, if any was armed
    pub fn pending_last_will(&self) -> Option<LastWill> {
        self.last_will.lock().clone()
    }
}

impl Transport for MqttTransport {
    fn set_last_will(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        *self.last_will.lock() = Some(LastWill::new(topic, payload, QOS, false));
        Ok(())
    }

    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.client
            .try_publish(topic, QOS, false, payload)
            .map_err(|e| NodeError::Transport(format!("publish to {topic} failed: {e}")))
    }

    fn subscribe(&self, topic: &str) -> Result<()> {
        self.client
            .try_subscribe(topic, QOS)
            .map_err(|e| NodeError::Transport(format!("subscribe to {topic} failed: {e}")))
    }

    fn reconnect(&self) -> Result<()> {
        // The next EventLoop::poll opens a new connection
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        self.client
            .try_disconnect()
            .map_err(|e| NodeError::Transport(format!("disconnect failed: {e}")))
    }
}

/// Polls the event loop and turns its events into session notifications.
/// Returns when the client is dropped or disconnected, or with an error when
/// the retry policy gives up or NBIRTH cannot be built.
pub async fn drive<P, C>(session: &Session<MqttTransport, P, C>, eventloop: &mut EventLoop) -> Result<()>
where
    P: MetricsProvider,
    C: Clock,
{
    let mut retry = Retry::new(session.retry_policy());

    loop {
        if !session.is_connected() {
            if let Some(will) = session.transport().pending_last_will() {
                eventloop.mqtt_options.set_last_will(will);
            }
        }

        match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    retry.reset();
                    session.on_connected()?;
                } else {
                    let reason = format!("connection refused: {:?}", ack.code);
                    session.on_disconnected(&reason).await?;
                    backoff(&mut retry, &reason).await?;
                }
            }
            Ok(Event::Incoming(Incoming::Publish(publish))) => {
                if let Err(e) = session.on_message(&publish.topic, &publish.payload) {
                    warn!("Ignoring message on {}: {}", publish.topic, e);
                }
            }
            Ok(Event::Incoming(Incoming::Disconnect)) => {
                // The connection error surfaces on the next poll
                warn!("Disconnected by broker");
            }
            Ok(Event::Outgoing(rumqttc::Outgoing::Disconnect)) => {
                info!("Clean disconnect sent, stopping event loop");
                return Ok(());
            }
            Ok(event) => debug!("MQTT event: {:?}", event),
            Err(ConnectionError::RequestsDone) => {
                info!("MQTT client closed, stopping event loop");
                return Ok(());
            }
            Err(e) => {
                let reason = e.to_string();
                error!("MQTT connection error: {}", reason);
                session.on_disconnected(&reason).await?;
                backoff(&mut retry, &reason).await?;
            }
        }
    }
}

async fn backoff(retry: &mut Retry, reason: &str) -> Result<()> {
    let delay = retry.next_delay(reason)?;
    if !delay.is_zero() {
        info!("Reconnecting in {:.2} seconds", delay.as_secs_f64());
        tokio::time::sleep(delay).await;
    }
    Ok(())
}
