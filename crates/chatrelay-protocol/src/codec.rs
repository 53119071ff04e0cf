//! Byte layouts for handshake requests and relay frames.
//!
//! ```text
//! handshake (stream):
//! ┌──────────────┬───────────┬───────┬──────────────────────┬───────────┬──────────┐
//! │room_name_size│ operation │ state │ payload_size (29, BE)│ room_name │ username │
//! │     1 B      │    1 B    │  1 B  │        29 B          │   var     │   var    │
//! └──────────────┴───────────┴───────┴──────────────────────┴───────────┴──────────┘
//!
//! relay (datagram):
//! ┌──────────────┬────────────┬───────────┬───────┬──────────────────────┐
//! │room_name_size│ token_size │ room_name │ token │ message (to the end) │
//! │     1 B      │    1 B     │   var     │  var  │         var          │
//! └──────────────┴────────────┴───────────┴───────┴──────────────────────┘
//! ```

use crate::{Operation, ProtocolError, Token};

/// Size of the fixed handshake header.
pub const HANDSHAKE_HEADER_LEN: usize = 32;

/// Width of the big-endian `payload_size` field in the handshake header.
pub const PAYLOAD_SIZE_LEN: usize = 29;

/// Size of the fixed relay frame header.
pub const RELAY_HEADER_LEN: usize = 2;

/// `payload_size` is 29 bytes wide but we only ever read the low 8.
const PAYLOAD_SIZE_HIGH_LEN: usize = PAYLOAD_SIZE_LEN - 8;

fn malformed(reason: impl Into<String>) -> ProtocolError {
    ProtocolError::MalformedFrame(reason.into())
}

fn utf8<'a>(bytes: &'a [u8], field: &str) -> Result<&'a str, ProtocolError> {
    std::str::from_utf8(bytes)
        .map_err(|_| malformed(format!("{field} is not valid UTF-8")))
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// The decoded fixed-size part of a handshake request.
///
/// The header tells the reader how many more bytes to pull off the stream:
/// [`body_len`](Self::body_len).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeHeader {
    pub operation: Operation,
    pub room_name_size: usize,
    pub payload_size: usize,
}

impl HandshakeHeader {
    /// Decodes the 32-byte header.
    ///
    /// `max_payload` caps the username length a client may declare; the
    /// 29-byte field could otherwise ask us to buffer absurd amounts.
    ///
    /// # Errors
    /// - [`ProtocolError::MalformedFrame`] for a short buffer, a non-zero
    ///   `state` byte, or a `payload_size` above `max_payload`.
    /// - [`ProtocolError::UnsupportedOperation`] for an unknown op code.
    pub fn decode(
        bytes: &[u8],
        max_payload: usize,
    ) -> Result<Self, ProtocolError> {
        if bytes.len() < HANDSHAKE_HEADER_LEN {
            return Err(malformed(format!(
                "handshake header needs {HANDSHAKE_HEADER_LEN} bytes, got {}",
                bytes.len()
            )));
        }

        let room_name_size = usize::from(bytes[0]);
        let operation = Operation::try_from(bytes[1])?;
        let state = bytes[2];
        if state != 0 {
            return Err(malformed(format!("reserved state byte is {state}")));
        }

        let size_field = &bytes[3..HANDSHAKE_HEADER_LEN];
        let (high, low) = size_field.split_at(PAYLOAD_SIZE_HIGH_LEN);
        if high.iter().any(|&b| b != 0) {
            return Err(malformed("payload size exceeds 64 bits"));
        }
        let mut low_bytes = [0u8; 8];
        low_bytes.copy_from_slice(low);
        let payload_size = u64::from_be_bytes(low_bytes);
        let payload_size = usize::try_from(payload_size)
            .ok()
            .filter(|&n| n <= max_payload)
            .ok_or_else(|| {
                malformed(format!(
                    "payload size {payload_size} exceeds limit {max_payload}"
                ))
            })?;

        Ok(Self {
            operation,
            room_name_size,
            payload_size,
        })
    }

    /// Number of body bytes that follow the header.
    pub fn body_len(&self) -> usize {
        self.room_name_size + self.payload_size
    }
}

/// A complete handshake request: create or join `room_name` as `username`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    pub operation: Operation,
    pub room_name: String,
    pub username: String,
}

impl HandshakeRequest {
    /// Builds the request from an already-decoded header and its body.
    ///
    /// # Errors
    /// [`ProtocolError::MalformedFrame`] if the body length doesn't match
    /// the header or either field isn't UTF-8.
    pub fn from_parts(
        header: HandshakeHeader,
        body: &[u8],
    ) -> Result<Self, ProtocolError> {
        if body.len() != header.body_len() {
            return Err(malformed(format!(
                "handshake body is {} bytes, header declares {}",
                body.len(),
                header.body_len()
            )));
        }
        let (room, user) = body.split_at(header.room_name_size);
        Ok(Self {
            operation: header.operation,
            room_name: utf8(room, "room name")?.to_owned(),
            username: utf8(user, "username")?.to_owned(),
        })
    }

    /// Decodes a whole request (header followed by exactly its body).
    pub fn decode(
        bytes: &[u8],
        max_payload: usize,
    ) -> Result<Self, ProtocolError> {
        let header = HandshakeHeader::decode(bytes, max_payload)?;
        Self::from_parts(header, &bytes[HANDSHAKE_HEADER_LEN..])
    }

    /// Encodes the request as a client would send it.
    ///
    /// # Errors
    /// [`ProtocolError::MalformedFrame`] if the room name doesn't fit the
    /// 1-byte size field.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let room_name_size = u8::try_from(self.room_name.len())
            .map_err(|_| malformed("room name longer than 255 bytes"))?;

        let mut out = Vec::with_capacity(
            HANDSHAKE_HEADER_LEN + self.room_name.len() + self.username.len(),
        );
        out.push(room_name_size);
        out.push(self.operation.code());
        out.push(0);
        out.extend_from_slice(&[0u8; PAYLOAD_SIZE_HIGH_LEN]);
        out.extend_from_slice(&(self.username.len() as u64).to_be_bytes());
        out.extend_from_slice(self.room_name.as_bytes());
        out.extend_from_slice(self.username.as_bytes());
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

/// A decoded relay datagram, borrowing from the receive buffer.
///
/// `token` is left as raw bytes: a wrong-length token is structurally
/// fine, it just can't authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayFrame<'a> {
    pub room_name: &'a str,
    pub token: &'a [u8],
    pub message: &'a str,
}

impl<'a> RelayFrame<'a> {
    /// Decodes one datagram.
    ///
    /// The message has no length field; it runs to the end of `data`.
    ///
    /// # Errors
    /// [`ProtocolError::MalformedFrame`] if the declared sizes overrun the
    /// datagram or the room name / message aren't UTF-8.
    pub fn decode(data: &'a [u8]) -> Result<Self, ProtocolError> {
        if data.len() < RELAY_HEADER_LEN {
            return Err(malformed("relay frame shorter than its header"));
        }
        let room_name_size = usize::from(data[0]);
        let token_size = usize::from(data[1]);

        let body = &data[RELAY_HEADER_LEN..];
        if body.len() < room_name_size + token_size {
            return Err(malformed(format!(
                "relay frame declares {} name+token bytes, has {}",
                room_name_size + token_size,
                body.len()
            )));
        }
        let (room, rest) = body.split_at(room_name_size);
        let (token, message) = rest.split_at(token_size);

        Ok(Self {
            room_name: utf8(room, "room name")?,
            token,
            message: utf8(message, "message")?,
        })
    }

    /// The frame's token, if it has the right length.
    pub fn token(&self) -> Option<Token> {
        Token::from_slice(self.token)
    }

    /// Encodes a frame as a client would send it.
    ///
    /// # Errors
    /// [`ProtocolError::MalformedFrame`] if the room name or token don't
    /// fit their 1-byte size fields.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let room_name_size = u8::try_from(self.room_name.len())
            .map_err(|_| malformed("room name longer than 255 bytes"))?;
        let token_size = u8::try_from(self.token.len())
            .map_err(|_| malformed("token longer than 255 bytes"))?;

        let mut out = Vec::with_capacity(
            RELAY_HEADER_LEN
                + self.room_name.len()
                + self.token.len()
                + self.message.len(),
        );
        out.push(room_name_size);
        out.push(token_size);
        out.extend_from_slice(self.room_name.as_bytes());
        out.extend_from_slice(self.token);
        out.extend_from_slice(self.message.as_bytes());
        Ok(out)
    }
}
