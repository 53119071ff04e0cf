//! Wire protocol for chatrelay.
//!
//! This crate defines the byte layouts both channels speak:
//!
//! - **Types** ([`Token`], [`Operation`]): the values that appear
//!   inside frames.
//! - **Codec** ([`HandshakeHeader`], [`HandshakeRequest`],
//!   [`RelayFrame`]): how requests are laid out on the wire.
//! - **Replies** ([`HandshakeReply`], [`RelayReply`], [`ReplyFraming`]):
//!   what the server sends back, raw or with a status byte.
//! - **Errors** ([`ProtocolError`]): what can go wrong while decoding.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (frames) → Session directory (tokens, rooms)
//! ```
//!
//! Nothing here touches a socket. Encoders are provided for both sides so
//! clients and tests can build frames with the same code the server parses.

mod codec;
mod error;
mod reply;
mod types;

pub use codec::{
    HANDSHAKE_HEADER_LEN, HandshakeHeader, HandshakeRequest, PAYLOAD_SIZE_LEN,
    RELAY_HEADER_LEN, RelayFrame,
};
pub use error::ProtocolError;
pub use reply::{
    HandshakeReply, INVALID_TOKEN_NOTICE, ROOM_EXISTS_NOTICE,
    ROOM_MISMATCH_NOTICE, ROOM_NOT_FOUND_NOTICE, RelayReply, ReplyFraming,
    STATUS_ERROR, STATUS_OK,
};
pub use types::{Operation, TOKEN_LEN, Token};
