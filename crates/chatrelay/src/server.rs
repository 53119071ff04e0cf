//! `ChatRelayServer` builder and run loop.
//!
//! This is the entry point for running a relay. It binds both channels,
//! shares one [`SessionDirectory`] between them, and drives the handshake
//! accept loop and the relay receive loop side by side.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chatrelay_protocol::ReplyFraming;
use chatrelay_session::SessionDirectory;
use chatrelay_transport::{DatagramSocket, TcpTransport, Transport};

use crate::handshake::accept_loop;
use crate::relay::RelayEngine;
use crate::{ChatRelayError, RelayConfig};

/// State shared by every handshake task and the relay engine.
pub(crate) struct ServerState {
    pub(crate) directory: SessionDirectory,
    pub(crate) config: RelayConfig,
}

/// Builder for configuring and starting a relay.
///
/// # Example
///
/// ```rust,ignore
/// let server = ChatRelayServer::builder()
///     .handshake_addr("0.0.0.0:9001")
///     .relay_addr("0.0.0.0:9002")
///     .reply_framing(ReplyFraming::Tagged)
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct ChatRelayServerBuilder {
    config: RelayConfig,
    directory: SessionDirectory,
}

impl ChatRelayServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: RelayConfig::default(),
            directory: SessionDirectory::new(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address for the handshake listener.
    pub fn handshake_addr(mut self, addr: &str) -> Self {
        self.config.handshake_addr = addr.to_string();
        self
    }

    /// Sets the address for the relay socket.
    pub fn relay_addr(mut self, addr: &str) -> Self {
        self.config.relay_addr = addr.to_string();
        self
    }

    /// Sets how replies are framed on both channels.
    pub fn reply_framing(mut self, framing: ReplyFraming) -> Self {
        self.config.reply_framing = framing;
        self
    }

    /// Sets whether posters receive their own messages.
    pub fn echo_to_sender(mut self, echo: bool) -> Self {
        self.config.echo_to_sender = echo;
        self
    }

    /// Sets whether relay frames must name their token's own room.
    pub fn enforce_room_binding(mut self, enforce: bool) -> Self {
        self.config.enforce_room_binding = enforce;
        self
    }

    /// Sets the handshake read timeout. `Duration::ZERO` disables it.
    /// Durations beyond `u64::MAX` milliseconds saturate.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout_ms =
            u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Uses an existing directory instead of a fresh one.
    pub fn directory(mut self, directory: SessionDirectory) -> Self {
        self.directory = directory;
        self
    }

    /// Validates the config and binds both channels.
    ///
    /// # Errors
    /// [`ChatRelayError::Config`] for an invalid config, or
    /// [`ChatRelayError::Transport`] if either address can't be bound.
    pub async fn build(self) -> Result<ChatRelayServer, ChatRelayError> {
        self.config.validate()?;

        let handshake = TcpTransport::bind(&self.config.handshake_addr).await?;
        let relay = DatagramSocket::bind(&self.config.relay_addr).await?;

        let state = Arc::new(ServerState {
            directory: self.directory,
            config: self.config,
        });

        Ok(ChatRelayServer {
            handshake,
            relay,
            state,
        })
    }
}

impl Default for ChatRelayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound relay, ready to run.
pub struct ChatRelayServer {
    handshake: TcpTransport,
    relay: DatagramSocket,
    state: Arc<ServerState>,
}

impl ChatRelayServer {
    /// Creates a new builder.
    pub fn builder() -> ChatRelayServerBuilder {
        ChatRelayServerBuilder::new()
    }

    /// Returns the address the handshake listener is bound to.
    pub fn handshake_addr(&self) -> Result<SocketAddr, ChatRelayError> {
        Ok(self.handshake.local_addr()?)
    }

    /// Returns the address the relay socket is bound to.
    pub fn relay_addr(&self) -> Result<SocketAddr, ChatRelayError> {
        Ok(self.relay.local_addr()?)
    }

    /// Returns a handle to the server's session directory.
    pub fn directory(&self) -> SessionDirectory {
        self.state.directory.clone()
    }

    /// Runs both loops for the lifetime of the process.
    pub async fn run(self) -> Result<(), ChatRelayError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs both loops until `shutdown` resolves.
    ///
    /// Neither loop ends on its own: accept failures, malformed requests,
    /// and bad datagrams are logged and skipped.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ChatRelayError>
    where
        F: Future<Output = ()> + Send,
    {
        let ChatRelayServer {
            handshake,
            relay,
            state,
        } = self;

        tracing::info!(
            handshake = %handshake.local_addr()?,
            relay = %relay.local_addr()?,
            framing = ?state.config.reply_framing,
            "chatrelay server running"
        );

        let engine = RelayEngine::new(relay, Arc::clone(&state));

        tokio::select! {
            _ = shutdown => {
                tracing::info!("chatrelay server shutting down");
            }
            _ = accept_loop(handshake, Arc::clone(&state)) => {}
            _ = engine.run() => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_timeout_stores_millis() {
        let builder =
            ChatRelayServerBuilder::new().handshake_timeout(Duration::from_millis(250));
        assert_eq!(builder.config.handshake_timeout_ms, 250);
    }

    #[test]
    fn test_handshake_timeout_huge_duration_saturates() {
        let builder = ChatRelayServerBuilder::new().handshake_timeout(Duration::MAX);
        assert_eq!(builder.config.handshake_timeout_ms, u64::MAX);
    }

    #[test]
    fn test_handshake_timeout_zero_disables() {
        let builder = ChatRelayServerBuilder::new().handshake_timeout(Duration::ZERO);
        assert_eq!(builder.config.handshake_timeout(), None);
    }
}
