/*!
Test Harness pour la session Sparkplug

Facilite l'écriture de tests avec:
- Setup automatique du transport simulé, des métriques scriptées et de l'horloge
- Raccourcis pour les transitions (connexion, déconnexion, NCMD)
- Accès aux NBIRTH / NDATA / NDEATH publiés, déjà décodés
*/

use anyhow::Result;
use parking_lot::Mutex;
use sparkplug_node::{
    Clock, Identifier, MetricsProvider, NodeError, Payload, Session, SessionOptions,
};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::mqtt_stub::{MockCall, MockTransport};
use crate::payload_helpers::decode;

pub type MockSession = Session<MockTransport, ScriptedMetrics, ManualClock>;

#[derive(Default)]
struct Script {
    cpu: VecDeque<f32>,
    disk: VecDeque<f32>,
    disk_failure: Option<String>,
}

/// Metrics provider fed from queues. When a queue runs dry the last value
/// handed out is repeated.
#[derive(Clone)]
pub struct ScriptedMetrics {
    script: Arc<Mutex<Script>>,
    last: Arc<Mutex<(f32, f32)>>,
    os: (String, String),
}

impl Default for ScriptedMetrics {
    fn default() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script::default())),
            last: Arc::new(Mutex::new((1.0, 50.0))),
            os: ("Linux".to_string(), "6.1.0-test".to_string()),
        }
    }
}

impl ScriptedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_cpu(&self, values: &[f32]) {
        self.script.lock().cpu.extend(values);
    }

    pub fn push_disk(&self, values: &[f32]) {
        self.script.lock().disk.extend(values);
    }

    /// Disk reads fail with `message` until cleared with `None`
    pub fn set_disk_failure(&self, message: Option<&str>) {
        self.script.lock().disk_failure = message.map(str::to_string);
    }
}

impl MetricsProvider for ScriptedMetrics {
    fn cpu_percent(&self) -> sparkplug_node::Result<f32> {
        let mut last = self.last.lock();
        if let Some(v) = self.script.lock().cpu.pop_front() {
            last.0 = v;
        }
        Ok(last.0)
    }

    fn disk_usage_percent(&self, path: &Path) -> sparkplug_node::Result<f32> {
        let mut script = self.script.lock();
        if let Some(message) = &script.disk_failure {
            return Err(NodeError::Provider(format!("{}: {}", path.display(), message)));
        }
        let mut last = self.last.lock();
        if let Some(v) = script.disk.pop_front() {
            last.1 = v;
        }
        Ok(last.1)
    }

    fn os_name(&self) -> sparkplug_node::Result<String> {
        Ok(self.os.0.clone())
    }

    fn os_version(&self) -> sparkplug_node::Result<String> {
        Ok(self.os.1.clone())
    }
}

/// Clock moved by hand
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn at(millis: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(millis)),
        }
    }

    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Harness de test complet pour la session
pub struct TestHarness {
    pub session: MockSession,
    pub transport: MockTransport,
    pub metrics: ScriptedMetrics,
    pub clock: ManualClock,
}

impl TestHarness {
    /// Crée un nouveau harness de test (group `G`, node `N`)
    pub fn new() -> Self {
        Self::with_options(Identifier::new("G", "N"), SessionOptions::default())
    }

    pub fn with_options(ident: Identifier, options: SessionOptions) -> Self {
        env_logger::try_init().ok(); // Init logging pour tests

        let transport = MockTransport::new();
        let metrics = ScriptedMetrics::new();
        let clock = ManualClock::at(1_700_000_000_000);
        let session = Session::new(
            ident,
            transport.clone(),
            metrics.clone(),
            clock.clone(),
            options,
        );

        Self {
            session,
            transport,
            metrics,
            clock,
        }
    }

    /// First connection: arm NDEATH, then the broker accepts
    pub fn connect(&self) -> Result<()> {
        self.session.arm_death()?;
        self.session.on_connected()?;
        Ok(())
    }

    pub fn send_command(&self, bytes: &[u8]) -> Result<bool> {
        let topic = self.session.identifier().command_topic();
        Ok(self.session.on_message(&topic, bytes)?)
    }

    pub fn births(&self) -> Result<Vec<Payload>> {
        self.decode_topic(&self.session.identifier().birth_topic())
    }

    pub fn data(&self) -> Result<Vec<Payload>> {
        self.decode_topic(&self.session.identifier().data_topic())
    }

    pub fn last_wills(&self) -> Result<Vec<Payload>> {
        self.transport
            .last_wills()
            .iter()
            .map(|m| decode(&m.payload))
            .collect()
    }

    /// Every payload handed to the transport (wills and publishes), in order
    pub fn built_payloads(&self) -> Result<Vec<Payload>> {
        self.transport
            .calls()
            .iter()
            .filter_map(|c| match c {
                MockCall::SetLastWill(m) | MockCall::Publish(m) => Some(decode(&m.payload)),
                _ => None,
            })
            .collect()
    }

    fn decode_topic(&self, topic: &str) -> Result<Vec<Payload>> {
        self.transport
            .find_messages_by_topic(topic)
            .iter()
            .map(|m| decode(&m.payload))
            .collect()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
