//! Sparkplug session state machine
//!
//! ```text
//! Disconnected --arm NDEATH as last will--> Connecting --ConnAck--> Connected
//!      ^                                                                |
//!      +-------------------------- on_disconnected ---------------------+
//! ```
//!
//! On every connection attempt the NDEATH carrying the pending bdSeq is
//! registered first. Once connected, the NCMD topic is subscribed, the NBIRTH
//! with that same bdSeq is published and only then is bdSeq advanced.
//! NDATA is published by a timer while connected; an NCMD rebirth request
//! republishes NBIRTH immediately.
//!
//! Every mutation of [`SessionState`] happens under its single lock, so the
//! timer and the transport notifications never interleave inside a payload.

use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{NodeError, Result};
use crate::metrics::{Clock, MetricsProvider, SystemClock};
use crate::payload::{PayloadBuilder, PayloadKind};
use crate::proto::{Metric, Payload};
use crate::retry::{Retry, RetryPolicy};
use crate::schema::{ALIAS_REBIRTH, METRIC_NAME_REBIRTH};
use crate::state::{new_state, ConnectionState, SessionState, Shared};
use crate::topics::Identifier;
use crate::transport::Transport;

/// Tunables of a session that are not part of the node identity
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Filesystem whose usage is reported as `System/DiskUsage`
    pub disk_path: PathBuf,
    pub retry: RetryPolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            disk_path: PathBuf::from("/"),
            retry: RetryPolicy::forever(),
        }
    }
}

pub struct Session<T, P, C = SystemClock> {
    ident: Identifier,
    transport: T,
    provider: P,
    clock: C,
    options: SessionOptions,
    state: Shared<SessionState>,
}

/// Whether a metric of an inbound NCMD asks for a rebirth. Matches by name,
/// or by the reserved alias for publishers that assign one.
pub fn is_rebirth_request(metric: &Metric) -> bool {
    metric.name.as_deref() == Some(METRIC_NAME_REBIRTH) || metric.alias == Some(ALIAS_REBIRTH)
}

impl<T, P, C> Session<T, P, C>
where
    T: Transport,
    P: MetricsProvider,
    C: Clock,
{
    pub fn new(ident: Identifier, transport: T, provider: P, clock: C, options: SessionOptions) -> Self {
        Self {
            ident,
            transport,
            provider,
            clock,
            options,
            state: new_state(SessionState::new()),
        }
    }

    pub fn identifier(&self) -> &Identifier {
        &self.ident
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.options.retry
    }

    /// Copy of the current session state
    pub fn snapshot(&self) -> SessionState {
        self.state.lock().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().is_connected()
    }

    fn builder(&self) -> PayloadBuilder<'_> {
        PayloadBuilder::new(&self.provider, &self.clock, &self.options.disk_path)
    }

    /// Builds the NDEATH for the pending bdSeq and registers it as the last
    /// will of the next connection attempt. Must precede every connect.
    pub fn arm_death(&self) -> Result<()> {
        let mut state = self.state.lock();
        let death = self.builder().build(PayloadKind::Death, &mut state)?;
        let topic = self.ident.death_topic();

        self.transport.set_last_will(&topic, death.payload.to_bytes())?;
        state.connection = ConnectionState::Connecting;

        info!(
            "Setting death message to topic '{}' with bdSeq={}",
            topic,
            state.sequence.next_birth_death_seq()
        );
        Ok(())
    }

    /// Connecting -> Connected: subscribe to NCMD, publish NBIRTH, advance bdSeq.
    pub fn on_connected(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.connection = ConnectionState::Connected;

        let cmd_topic = self.ident.command_topic();
        self.transport.subscribe(&cmd_topic)?;
        debug!("Subscribed to commands on: {}", cmd_topic);

        let bd_seq = state.sequence.next_birth_death_seq();
        state.active_bd_seq = Some(bd_seq);

        let birth = self.builder().build(PayloadKind::Birth, &mut state)?;
        let topic = self.ident.birth_topic();
        self.transport.publish(&topic, birth.payload.to_bytes())?;
        birth.commit(&mut state);
        state.sequence.advance_birth_death_seq();

        info!(
            "Connected as {}, sent birth message to topic '{}' with bdSeq={}",
            self.ident, topic, bd_seq
        );
        Ok(())
    }

    /// Connected -> Disconnected, then re-arm NDEATH and request reconnection
    /// until the transport accepts an attempt or the retry policy gives up.
    pub async fn on_disconnected(&self, reason: &str) -> Result<()> {
        {
            let mut state = self.state.lock();
            state.connection = ConnectionState::Disconnected;
            state.active_bd_seq = None;
        }
        warn!("Disconnected: {}", reason);

        let mut retry = Retry::new(self.options.retry);
        loop {
            info!("Trying to reconnect to the broker...");
            match self.arm_death().and_then(|_| self.transport.reconnect()) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    let message = e.to_string();
                    warn!("Failed to reconnect to the broker: {}", message);
                    self.state.lock().connection = ConnectionState::Disconnected;

                    let delay = retry.next_delay(&message)?;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    /// Publishes one NDATA if connected. Returns whether a payload was sent;
    /// nothing is built or queued while disconnected.
    pub fn publish_data(&self) -> Result<bool> {
        let mut state = self.state.lock();
        if !state.is_connected() {
            debug!("Not connected, skipping data message");
            return Ok(false);
        }

        let data = self.builder().build(PayloadKind::Data, &mut state)?;
        let topic = self.ident.data_topic();
        self.transport.publish(&topic, data.payload.to_bytes())?;
        data.commit(&mut state);

        debug!("Sent data message to topic '{}' with seq={:?}", topic, data.payload.seq);
        Ok(true)
    }

    /// Republishes NBIRTH for the current connection. Ignored while not connected.
    pub fn rebirth(&self) -> Result<bool> {
        let mut state = self.state.lock();
        if !state.is_connected() {
            warn!("Rebirth requested while not connected, ignoring");
            return Ok(false);
        }

        let birth = self.builder().build(PayloadKind::Birth, &mut state)?;
        let topic = self.ident.birth_topic();
        self.transport.publish(&topic, birth.payload.to_bytes())?;
        birth.commit(&mut state);

        info!("Resent birth message to topic '{}' with seq={:?}", topic, birth.payload.seq);
        Ok(true)
    }

    /// Handles an inbound message. Only NCMD on the node's own topic is
    /// interpreted and only the rebirth command acts; every other metric is
    /// logged. Returns whether a rebirth was published.
    pub fn on_message(&self, topic: &str, bytes: &[u8]) -> Result<bool> {
        if topic != self.ident.command_topic() {
            debug!("Ignoring message on unexpected topic: {}", topic);
            return Ok(false);
        }

        let payload = Payload::from_bytes(bytes)?;

        let mut rebirth_requested = false;
        for metric in &payload.metrics {
            info!(
                "Received cmd metric with name '{}', alias {:?}",
                metric.name.as_deref().unwrap_or(""),
                metric.alias
            );
            rebirth_requested |= is_rebirth_request(metric);
        }

        if !rebirth_requested {
            return Ok(false);
        }

        info!("Received rebirth command");
        self.rebirth()
    }

    /// Publishes NDEATH explicitly before a clean disconnect, since the broker
    /// drops the last will when the client disconnects on purpose.
    pub fn shutdown(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.is_connected() {
            let death = self.builder().build(PayloadKind::Death, &mut state)?;
            self.transport.publish(&self.ident.death_topic(), death.payload.to_bytes())?;
            info!("Published death message for {}", self.ident);
        }
        state.connection = ConnectionState::Disconnected;
        state.active_bd_seq = None;
        self.transport.disconnect()
    }
}

/// Runs `publish_data` every `interval` until the provider has failed
/// `max_provider_failures` times in a row.
pub async fn publish_loop<T, P, C>(
    session: &Session<T, P, C>,
    interval: Duration,
    max_provider_failures: u32,
) -> Result<()>
where
    T: Transport,
    P: MetricsProvider,
    C: Clock,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // first tick completes immediately, data starts one interval after start
    ticker.tick().await;

    let mut provider_failures = 0u32;
    loop {
        ticker.tick().await;
        match session.publish_data() {
            Ok(_) => provider_failures = 0,
            Err(NodeError::Provider(msg)) => {
                provider_failures += 1;
                warn!(
                    "Skipping data message, metrics unavailable ({}/{}): {}",
                    provider_failures, max_provider_failures, msg
                );
                if provider_failures >= max_provider_failures {
                    return Err(NodeError::Provider(msg));
                }
            }
            Err(e) => warn!("Failed to send data message: {}", e),
        }
    }
}
