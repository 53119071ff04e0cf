//! Server configuration.

use std::path::Path;
use std::time::Duration;

use chatrelay_protocol::{RELAY_HEADER_LEN, ReplyFraming, TOKEN_LEN};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Default address for the handshake (stream) listener.
pub const DEFAULT_HANDSHAKE_ADDR: &str = "127.0.0.1:9001";

/// Default address for the relay (datagram) socket.
pub const DEFAULT_RELAY_ADDR: &str = "127.0.0.1:9002";

/// Settings for a [`ChatRelayServer`](crate::ChatRelayServer).
///
/// Every field has a default, so a config file only needs the fields it
/// changes:
///
/// ```json
/// { "relay_addr": "0.0.0.0:9002", "reply_framing": "tagged" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Where the handshake listener binds.
    pub handshake_addr: String,

    /// Where the relay socket binds.
    pub relay_addr: String,

    /// How long a client gets to send its whole handshake request.
    /// 0 disables the limit.
    pub handshake_timeout_ms: u64,

    /// Largest username (handshake `payload_size`) accepted, in bytes.
    pub max_username_len: usize,

    /// Receive buffer for relay datagrams. Longer datagrams are truncated
    /// by the OS, which cuts the message short.
    pub max_datagram_size: usize,

    /// Raw replies, or replies with a leading status byte.
    pub reply_framing: ReplyFraming,

    /// Whether the poster also receives its own formatted line.
    pub echo_to_sender: bool,

    /// Reject relay frames that name a room other than the one the token
    /// was issued for. Off by default: frames may name any room.
    pub enforce_room_binding: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            handshake_addr: DEFAULT_HANDSHAKE_ADDR.to_string(),
            relay_addr: DEFAULT_RELAY_ADDR.to_string(),
            handshake_timeout_ms: 5_000,
            max_username_len: 1024,
            max_datagram_size: 4096,
            reply_framing: ReplyFraming::Raw,
            echo_to_sender: true,
            enforce_room_binding: false,
        }
    }
}

impl RelayConfig {
    /// Parses a config from JSON text. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// The handshake timeout, or `None` if disabled.
    pub fn handshake_timeout(&self) -> Option<Duration> {
        (self.handshake_timeout_ms > 0)
            .then(|| Duration::from_millis(self.handshake_timeout_ms))
    }

    /// Checks that the values can work together.
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] if the datagram buffer can't hold a header
    /// plus a full token, or if a bind address is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let min_datagram = RELAY_HEADER_LEN + TOKEN_LEN;
        if self.max_datagram_size < min_datagram {
            return Err(ConfigError::Invalid(format!(
                "max_datagram_size must be at least {min_datagram}, got {}",
                self.max_datagram_size
            )));
        }
        if self.handshake_addr.is_empty() || self.relay_addr.is_empty() {
            return Err(ConfigError::Invalid("bind addresses must be set".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_uses_loopback_ports() {
        let config = RelayConfig::default();
        assert_eq!(config.handshake_addr, "127.0.0.1:9001");
        assert_eq!(config.relay_addr, "127.0.0.1:9002");
        assert_eq!(config.reply_framing, ReplyFraming::Raw);
        assert!(config.echo_to_sender);
        assert!(!config.enforce_room_binding);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_str_partial_fills_defaults() {
        let config = RelayConfig::from_json_str(
            r#"{ "relay_addr": "0.0.0.0:7000", "reply_framing": "tagged" }"#,
        )
        .expect("should parse");

        assert_eq!(config.relay_addr, "0.0.0.0:7000");
        assert_eq!(config.reply_framing, ReplyFraming::Tagged);
        assert_eq!(config.handshake_addr, DEFAULT_HANDSHAKE_ADDR);
        assert_eq!(config.max_username_len, 1024);
    }

    #[test]
    fn test_from_json_str_bad_json_is_parse_error() {
        let result = RelayConfig::from_json_str("{ not json");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_from_json_str_tiny_datagram_buffer_is_invalid() {
        let result = RelayConfig::from_json_str(r#"{ "max_datagram_size": 16 }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_json_file_missing_is_io_error() {
        let result = RelayConfig::from_json_file("/definitely/not/here.json");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_handshake_timeout_zero_disables() {
        let config = RelayConfig {
            handshake_timeout_ms: 0,
            ..RelayConfig::default()
        };
        assert_eq!(config.handshake_timeout(), None);
        assert_eq!(
            RelayConfig::default().handshake_timeout(),
            Some(Duration::from_secs(5))
        );
    }
}
