//! Pluggable outgoing transport.

use std::io;

/// The byte sink the write loop drains into.
///
/// Implement over TCP, WebSocket or an HTTP poll channel; the write
/// loop only needs to push complete frames and observe connection
/// staleness. Reads live elsewhere.
pub trait Transport: Send {
    /// Write one complete frame.
    fn write(&mut self, frame: &[u8]) -> impl std::future::Future<Output = io::Result<()>> + Send;

    /// True when the connection has been marked stale: the write loop
    /// must stop without further writes and let the owner reconnect.
    fn should_reconnect(&self) -> bool;

    /// Request an asynchronous reconnect after a write failure. Must
    /// not block; the actual reconnection happens elsewhere.
    fn request_reconnect(&mut self);
}
