//! Error types for the Sparkplug node

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("metrics provider failed: {0}")]
    Provider(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode payload: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("gave up reconnecting after {attempts} attempts: {last_error}")]
    ReconnectExhausted { attempts: u32, last_error: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(err: &NodeError) -> &'static str {
        match err {
            NodeError::Config(_) => "config",
            NodeError::Provider(_) => "provider",
            NodeError::Transport(_) => "transport",
            NodeError::Decode(_) => "decode",
            NodeError::ReconnectExhausted { .. } => "reconnect",
            NodeError::Io(_) => "io",
        }
    }

    #[test]
    fn test_payload_errors_only_come_from_decoding() {
        let err: NodeError = crate::proto::Payload::from_bytes(&[0x0f]).unwrap_err();
        assert_eq!(kind(&err), "decode");
        assert!(err.to_string().starts_with("failed to decode payload"));
    }
}
