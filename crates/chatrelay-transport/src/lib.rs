//! Transport layer for chatrelay.
//!
//! Two very different channels live here:
//!
//! - A **reliable stream** ([`TcpTransport`] / [`TcpConnection`]) used
//!   once per client for the handshake. It is exposed through the
//!   [`Transport`] and [`Connection`] traits so the handshake service
//!   doesn't care which socket type is underneath.
//! - An **unreliable datagram** socket ([`DatagramSocket`]) used for
//!   every chat message afterwards.
//!
//! Nothing in this crate knows about rooms, tokens, or frame layouts.
//! It moves bytes and reports I/O failures as [`TransportError`].

#![allow(async_fn_in_trait)]

mod datagram;
mod error;
mod stream;

pub use datagram::DatagramSocket;
pub use error::TransportError;
pub use stream::{TcpConnection, TcpTransport};

use std::fmt;
use std::net::SocketAddr;

/// Opaque identifier for a stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming stream connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Returns the address the transport is listening on.
    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;
}

/// A single reliable connection.
///
/// The handshake protocol is length-driven (fixed header, then sizes taken
/// from the header), so receiving is expressed as "read exactly `len`
/// bytes" rather than "read the next message".
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends all of `data` to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Reads exactly `len` bytes from the remote peer.
    ///
    /// Fails with a "connection closed" error if the peer hangs up first.
    async fn recv_exact(&self, len: usize) -> Result<Vec<u8>, Self::Error>;

    /// Flushes and shuts down the write side of the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Returns the remote peer's address.
    fn peer_addr(&self) -> SocketAddr;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_compares_by_value() {
        assert_eq!(ConnectionId::new(42), ConnectionId::new(42));
        assert_ne!(ConnectionId::new(42), ConnectionId::new(43));
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
        map.insert(ConnectionId::new(1), "alice");
        map.insert(ConnectionId::new(2), "bob");
        assert_eq!(map[&ConnectionId::new(1)], "alice");
    }
}
