//! Transport layer for the companion sync service.
//!
//! Provides the [`Transport`] trait for accepting connections, a TCP
//! implementation ([`TcpTransport`]), and the length-prefixed framing
//! ([`FrameReader`], [`FrameWriter`]) that turns a byte stream into
//! discrete messages.
//!
//! ```text
//! [4-byte big-endian length][payload bytes]
//! ```
//!
//! TCP does not preserve message boundaries, so every payload travels
//! inside a frame. A reader never hands out a partial frame.

#![allow(async_fn_in_trait)]

mod error;
mod frame;
mod tcp;

pub use error::TransportError;
pub use frame::{encode_frame, FrameReader, FrameWriter, DEFAULT_MAX_FRAME_LEN, LENGTH_PREFIX_LEN};
pub use tcp::{TcpConnection, TcpTransport};

use std::fmt;
use std::net::SocketAddr;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Send + 'static;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Returns the address the transport is listening on.
    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionId::new(1), "tablet");
        map.insert(ConnectionId::new(2), "phone");
        assert_eq!(map[&ConnectionId::new(1)], "tablet");
    }
}
