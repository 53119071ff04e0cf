//! Unreliable datagram transport over UDP, used for chat relay.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;

use crate::TransportError;

/// A bound UDP socket.
///
/// Cheap to clone: clones share the same underlying socket, so the relay
/// can keep receiving on one handle while fan-out tasks send on others.
#[derive(Debug, Clone)]
pub struct DatagramSocket {
    socket: Arc<UdpSocket>,
}

impl DatagramSocket {
    /// Binds a new datagram socket to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(TransportError::BindFailed)?;
        tracing::info!(addr, "datagram transport listening");
        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    /// Receives one datagram into `buf`.
    ///
    /// Bytes beyond `buf.len()` are discarded by the OS.
    pub async fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> Result<(usize, SocketAddr), TransportError> {
        self.socket
            .recv_from(buf)
            .await
            .map_err(TransportError::ReceiveFailed)
    }

    /// Sends one datagram to `target`.
    pub async fn send_to(
        &self,
        data: &[u8],
        target: SocketAddr,
    ) -> Result<(), TransportError> {
        self.socket
            .send_to(data, target)
            .await
            .map(|_| ())
            .map_err(TransportError::SendFailed)
    }

    /// Returns the address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.socket
            .local_addr()
            .map_err(TransportError::BindFailed)
    }
}
