//! Values that appear inside chatrelay frames.

use std::fmt;

use crate::ProtocolError;

/// Length in bytes of every session token.
///
/// The relay frame carries the token length in a single byte, so 255 is
/// also the largest token the wire format can express.
pub const TOKEN_LEN: usize = 255;

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// An opaque bearer credential bound to one session.
///
/// Tokens are minted by the session directory from a cryptographically
/// secure source; this type only carries the bytes. Possessing a token is
/// all it takes to post into the room it was issued for, so `Debug` and
/// `Display` print only a short prefix.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Token([u8; TOKEN_LEN]);

impl Token {
    /// Wraps raw token bytes.
    pub fn new(bytes: [u8; TOKEN_LEN]) -> Self {
        Self(bytes)
    }

    /// Interprets a byte slice as a token.
    ///
    /// Returns `None` unless the slice is exactly [`TOKEN_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }

    /// Returns the raw token bytes, exactly as sent on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("t-")?;
        for b in &self.0[..4] {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({self})")
    }
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// The handshake operation requested by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Create a new room and become its host.
    Create,
    /// Join an existing room as a guest.
    Join,
}

impl Operation {
    /// The byte used for this operation on the wire.
    pub fn code(self) -> u8 {
        match self {
            Self::Create => 1,
            Self::Join => 2,
        }
    }
}

impl TryFrom<u8> for Operation {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Create),
            2 => Ok(Self::Join),
            other => Err(ProtocolError::UnsupportedOperation(other)),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Join => write!(f, "join"),
        }
    }
}
