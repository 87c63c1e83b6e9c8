/*!
Mock MQTT transport pour tests sans broker

Enregistre chaque appel fait par la session (last will, publish, subscribe,
reconnect, disconnect) dans l'ordre, et permet de simuler des échecs de
reconnexion.
*/

use parking_lot::Mutex;
use sparkplug_node::{NodeError, Transport};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    SetLastWill(MockMessage),
    Publish(MockMessage),
    Subscribe(String),
    Reconnect { accepted: bool },
    Disconnect,
}

#[derive(Default)]
struct Recorded {
    calls: Vec<MockCall>,
    reconnect_failures: u32,
    fail_publish: bool,
}

/// Mock transport; clones share the same record
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<Recorded>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` reconnect requests are refused
    pub fn fail_next_reconnects(&self, n: u32) {
        self.inner.lock().reconnect_failures = n;
    }

    /// Makes every publish fail until called again with `false`
    pub fn fail_publishes(&self, fail: bool) {
        self.inner.lock().fail_publish = fail;
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.inner.lock().calls.clone()
    }

    pub fn get_published_messages(&self) -> Vec<MockMessage> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                MockCall::Publish(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    /// Trouve les messages publiés sur un topic donné
    pub fn find_messages_by_topic(&self, topic: &str) -> Vec<MockMessage> {
        self.get_published_messages()
            .into_iter()
            .filter(|m| m.topic == topic)
            .collect()
    }

    /// Every last will registered, oldest first
    pub fn last_wills(&self) -> Vec<MockMessage> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                MockCall::SetLastWill(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn get_subscriptions(&self) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                MockCall::Subscribe(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn reconnect_attempts(&self) -> Vec<bool> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                MockCall::Reconnect { accepted } => Some(*accepted),
                _ => None,
            })
            .collect()
    }

    /// Reset tous les appels enregistrés
    pub fn clear(&self) {
        self.inner.lock().calls.clear();
    }
}

impl Transport for MockTransport {
    fn set_last_will(&self, topic: &str, payload: Vec<u8>) -> sparkplug_node::Result<()> {
        log::info!("[MOCK] Last will on {}: {} bytes", topic, payload.len());
        self.inner.lock().calls.push(MockCall::SetLastWill(MockMessage {
            topic: topic.to_string(),
            payload,
        }));
        Ok(())
    }

    fn publish(&self, topic: &str, payload: Vec<u8>) -> sparkplug_node::Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_publish {
            return Err(NodeError::Transport(format!("publish to {topic} refused")));
        }
        log::info!("[MOCK] Published to {}: {} bytes", topic, payload.len());
        inner.calls.push(MockCall::Publish(MockMessage {
            topic: topic.to_string(),
            payload,
        }));
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> sparkplug_node::Result<()> {
        log::info!("[MOCK] Subscribed to {}", topic);
        self.inner.lock().calls.push(MockCall::Subscribe(topic.to_string()));
        Ok(())
    }

    fn reconnect(&self) -> sparkplug_node::Result<()> {
        let mut inner = self.inner.lock();
        let accepted = inner.reconnect_failures == 0;
        inner.calls.push(MockCall::Reconnect { accepted });
        if accepted {
            Ok(())
        } else {
            inner.reconnect_failures -= 1;
            Err(NodeError::Transport("connection refused".to_string()))
        }
    }

    fn disconnect(&self) -> sparkplug_node::Result<()> {
        self.inner.lock().calls.push(MockCall::Disconnect);
        Ok(())
    }
}
