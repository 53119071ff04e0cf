//! Session types: what the server remembers about each issued token.

use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

/// Whether a session created its room or joined it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Created the room. Always the first member.
    Host,
    /// Joined an existing room.
    Guest,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::Guest => write!(f, "guest"),
        }
    }
}

/// The server's record of one issued token.
///
/// `room_name`, `username`, and `role` are fixed at issuance. Only the
/// address fields move, and only through the relay path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The room this token was issued for.
    pub room_name: String,

    /// Display name prefixed to every message this session posts.
    pub username: String,

    /// Host or guest.
    pub role: Role,

    /// Where relay traffic for this session goes.
    ///
    /// `None` until the first relay datagram carrying the token arrives;
    /// after that, replaced by whatever source address the latest datagram
    /// came from, so clients behind NAT or on the move keep receiving.
    pub address: Option<SocketAddr>,

    /// When the last relay datagram carrying this token arrived.
    pub last_seen: Option<Instant>,
}

impl Session {
    pub(crate) fn new(room_name: &str, username: &str, role: Role) -> Self {
        Self {
            room_name: room_name.to_owned(),
            username: username.to_owned(),
            role,
            address: None,
            last_seen: None,
        }
    }
}
