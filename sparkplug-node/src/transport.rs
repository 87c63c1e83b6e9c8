//! Message bus capability consumed by the session
//!
//! Calls are non-blocking: implementations enqueue the request and the
//! transport's own I/O loop carries it out. Connection outcomes come back to
//! the session as `on_connected` / `on_disconnected` / `on_message`.

use crate::error::Result;

pub trait Transport: Send + Sync {
    /// Registers the message the broker publishes if this client drops
    /// without a clean disconnect. Only honoured for connection attempts
    /// started after the call.
    fn set_last_will(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    fn subscribe(&self, topic: &str) -> Result<()>;

    /// Requests a new connection attempt. `Ok` means the attempt was
    /// accepted, not that it succeeded.
    fn reconnect(&self) -> Result<()>;

    /// Clean disconnect. The broker discards the last will.
    fn disconnect(&self) -> Result<()>;
}
