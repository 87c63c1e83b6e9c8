use parking_lot::Mutex;
use std::sync::Arc;

use crate::sequence::SequenceAuthority;

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Mutable state of the single session of the process. Shared by the MQTT
/// notification path and the publish timer behind one lock.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub connection: ConnectionState,
    pub sequence: SequenceAuthority,
    /// Last disk usage actually emitted; NDATA skips the metric while unchanged.
    /// Survives reconnects.
    pub last_disk_usage_percent: Option<f32>,
    /// bdSeq announced by the NBIRTH of the current connection
    pub active_bd_seq: Option<u32>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    /// bdSeq of the current connection epoch: the value announced by NBIRTH
    /// while connected, otherwise the value the next NDEATH/NBIRTH pair carries.
    pub fn current_bd_seq(&self) -> u32 {
        self.active_bd_seq
            .unwrap_or_else(|| self.sequence.next_birth_death_seq())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_disconnected() {
        let state = SessionState::new();
        assert!(!state.is_connected());
        assert_eq!(state.last_disk_usage_percent, None);
        assert_eq!(state.current_bd_seq(), 0);
    }

    #[test]
    fn test_rebirth_keeps_active_bd_seq() {
        let mut state = SessionState::new();
        state.active_bd_seq = Some(state.sequence.next_birth_death_seq());
        state.sequence.advance_birth_death_seq();
        assert_eq!(state.current_bd_seq(), 0);
        assert_eq!(state.sequence.next_birth_death_seq(), 1);
    }

    #[test]
    fn test_shared_state_is_one_lock() {
        let shared = new_state(SessionState::new());
        let other = shared.clone();
        shared.lock().connection = ConnectionState::Connected;
        assert!(other.lock().is_connected());
    }
}
