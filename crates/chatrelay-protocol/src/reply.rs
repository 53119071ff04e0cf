//! Server replies on both channels.
//!
//! In the default [`ReplyFraming::Raw`] format a handshake reply is either
//! the bare 255-byte token or a short error text, and a relay reply is
//! either a chat line or a notice; nothing on the wire tells them apart.
//! [`ReplyFraming::Tagged`] prefixes every reply with a status byte so a
//! client no longer has to guess.

use serde::{Deserialize, Serialize};

use crate::{ProtocolError, TOKEN_LEN, Token};

/// Status byte for a successful reply in tagged framing.
pub const STATUS_OK: u8 = 0x00;

/// Status byte for an error or notice in tagged framing.
pub const STATUS_ERROR: u8 = 0x01;

/// Handshake error text when the room name is already taken.
pub const ROOM_EXISTS_NOTICE: &str = "room already exists";

/// Handshake error text when the room to join doesn't exist.
pub const ROOM_NOT_FOUND_NOTICE: &str = "room does not exist";

/// Relay notice sent back when a datagram's token isn't recognised.
pub const INVALID_TOKEN_NOTICE: &str = "invalid token";

/// Relay notice sent back when a token posts to a room it wasn't issued
/// for and room binding is enforced.
pub const ROOM_MISMATCH_NOTICE: &str = "token not valid for this room";

/// The outcome of a handshake, as sent to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeReply {
    /// The freshly minted session token.
    Token(Token),
    /// Why the request was refused.
    Error(String),
}

/// A reply on the relay channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayReply {
    /// A formatted `"<username>: <message>"` line.
    Chat(String),
    /// A server notice such as [`INVALID_TOKEN_NOTICE`].
    Notice(String),
}

/// How replies are framed on the wire.
///
/// Serialized in lowercase (`"raw"`, `"tagged"`) for config files.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ReplyFraming {
    /// Bare payloads, no status. Compatible with existing clients.
    #[default]
    Raw,
    /// One status byte ([`STATUS_OK`] / [`STATUS_ERROR`]) then the payload.
    Tagged,
}

impl ReplyFraming {
    /// Encodes a handshake reply.
    pub fn encode_handshake(self, reply: &HandshakeReply) -> Vec<u8> {
        let (status, body) = match reply {
            HandshakeReply::Token(token) => (STATUS_OK, token.as_bytes()),
            HandshakeReply::Error(text) => (STATUS_ERROR, text.as_bytes()),
        };
        self.frame(status, body)
    }

    /// Decodes a handshake reply, the way a client reads it.
    ///
    /// In raw framing a reply of exactly [`TOKEN_LEN`] bytes is taken to
    /// be a token and anything else an error text.
    ///
    /// # Errors
    /// [`ProtocolError::MalformedFrame`] for an empty tagged reply, an
    /// unknown status byte, a tagged token of the wrong length, or a
    /// non-UTF-8 error text.
    pub fn decode_handshake(
        self,
        data: &[u8],
    ) -> Result<HandshakeReply, ProtocolError> {
        match self {
            Self::Raw => match Token::from_slice(data) {
                Some(token) => Ok(HandshakeReply::Token(token)),
                None => Ok(HandshakeReply::Error(text(data)?)),
            },
            Self::Tagged => match split_status(data)? {
                (STATUS_OK, body) => Token::from_slice(body)
                    .map(HandshakeReply::Token)
                    .ok_or_else(|| {
                        ProtocolError::MalformedFrame(format!(
                            "token reply is {} bytes, expected {TOKEN_LEN}",
                            body.len()
                        ))
                    }),
                (_, body) => Ok(HandshakeReply::Error(text(body)?)),
            },
        }
    }

    /// Encodes a relay reply.
    pub fn encode_relay(self, reply: &RelayReply) -> Vec<u8> {
        let (status, body) = match reply {
            RelayReply::Chat(line) => (STATUS_OK, line.as_bytes()),
            RelayReply::Notice(line) => (STATUS_ERROR, line.as_bytes()),
        };
        self.frame(status, body)
    }

    /// Decodes a relay reply.
    ///
    /// Raw framing can't tell a notice from chat, so everything comes back
    /// as [`RelayReply::Chat`].
    pub fn decode_relay(
        self,
        data: &[u8],
    ) -> Result<RelayReply, ProtocolError> {
        match self {
            Self::Raw => Ok(RelayReply::Chat(text(data)?)),
            Self::Tagged => match split_status(data)? {
                (STATUS_OK, body) => Ok(RelayReply::Chat(text(body)?)),
                (_, body) => Ok(RelayReply::Notice(text(body)?)),
            },
        }
    }

    fn frame(self, status: u8, body: &[u8]) -> Vec<u8> {
        match self {
            Self::Raw => body.to_vec(),
            Self::Tagged => {
                let mut out = Vec::with_capacity(body.len() + 1);
                out.push(status);
                out.extend_from_slice(body);
                out
            }
        }
    }
}

fn split_status(data: &[u8]) -> Result<(u8, &[u8]), ProtocolError> {
    match data.split_first() {
        Some((&status, body)) if status == STATUS_OK || status == STATUS_ERROR => {
            Ok((status, body))
        }
        Some((&status, _)) => Err(ProtocolError::MalformedFrame(format!(
            "unknown status byte {status:#04x}"
        ))),
        None => Err(ProtocolError::MalformedFrame("empty reply".into())),
    }
}

fn text(data: &[u8]) -> Result<String, ProtocolError> {
    String::from_utf8(data.to_vec()).map_err(|_| {
        ProtocolError::MalformedFrame("reply is not valid UTF-8".into())
    })
}
