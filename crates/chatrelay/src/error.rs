//! Unified error types for the chatrelay server.

use std::time::Duration;

use chatrelay_protocol::ProtocolError;
use chatrelay_session::DirectoryError;
use chatrelay_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attributes let `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum ChatRelayError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A wire-format error (malformed frame, unsupported operation).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A directory error (room exists, room not found, unknown token).
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// Bad or unreadable configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A client didn't finish its handshake request in time.
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),
}

/// Errors raised while loading or validating a [`RelayConfig`](crate::RelayConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file couldn't be read.
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    /// The config file isn't valid JSON for a `RelayConfig`.
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// The values parsed but don't make sense together.
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let relay_err: ChatRelayError = err.into();
        assert!(matches!(relay_err, ChatRelayError::Transport(_)));
        assert!(relay_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::UnsupportedOperation(7);
        let relay_err: ChatRelayError = err.into();
        assert!(matches!(relay_err, ChatRelayError::Protocol(_)));
        assert_eq!(relay_err.to_string(), "unsupported operation code 7");
    }

    #[test]
    fn test_from_directory_error() {
        let err = DirectoryError::RoomExists("lobby".into());
        let relay_err: ChatRelayError = err.into();
        assert!(matches!(relay_err, ChatRelayError::Directory(_)));
    }

    #[test]
    fn test_from_config_error() {
        let err = ConfigError::Invalid("nope".into());
        let relay_err: ChatRelayError = err.into();
        assert!(matches!(relay_err, ChatRelayError::Config(_)));
        assert_eq!(relay_err.to_string(), "invalid config: nope");
    }
}
