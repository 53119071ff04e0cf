//! The shared, synchronized session directory.

use std::net::SocketAddr;
use std::sync::Arc;

use chatrelay_protocol::Token;
use tokio::sync::Mutex;

use crate::{DirectoryError, Session, SessionTable};

/// Shared handle to the room and session tables.
///
/// Cloning is cheap: every clone points at the same [`SessionTable`].
/// Each method takes the lock exactly once and releases it before
/// returning, so all operations are linearizable with respect to each
/// other. Two concurrent `create_room` calls for the same name can't both
/// succeed, and nobody can observe a token whose session isn't registered
/// yet.
///
/// Methods return owned data (`Session`, `Vec`) rather than references,
/// so no caller ever holds the lock across network I/O.
#[derive(Debug, Clone, Default)]
pub struct SessionDirectory {
    table: Arc<Mutex<SessionTable>>,
}

impl SessionDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new room and returns the host's token.
    pub async fn create_room(
        &self,
        room_name: &str,
        username: &str,
    ) -> Result<Token, DirectoryError> {
        self.table.lock().await.create_room(room_name, username)
    }

    /// Joins an existing room and returns a freshly minted guest token.
    pub async fn join_room(
        &self,
        room_name: &str,
        username: &str,
    ) -> Result<Token, DirectoryError> {
        self.table.lock().await.join_room(room_name, username)
    }

    /// Returns a snapshot of the session bound to `token`.
    pub async fn lookup(&self, token: &Token) -> Result<Session, DirectoryError> {
        self.table.lock().await.lookup(token).cloned()
    }

    /// Records the latest observed address for `token`.
    pub async fn update_address(
        &self,
        token: &Token,
        address: SocketAddr,
    ) -> Result<(), DirectoryError> {
        self.table.lock().await.update_address(token, address)
    }

    /// Authenticates `token` and learns `address` under one lock.
    ///
    /// Equivalent to [`lookup`](Self::lookup) followed by
    /// [`update_address`](Self::update_address), without a window between
    /// them. Returns the session as it is after the update.
    pub async fn observe(
        &self,
        token: &Token,
        address: SocketAddr,
    ) -> Result<Session, DirectoryError> {
        self.table.lock().await.observe(token, address).cloned()
    }

    /// Returns the member tokens of a room (empty if it doesn't exist).
    pub async fn members_of(&self, room_name: &str) -> Vec<Token> {
        self.table.lock().await.members_of(room_name)
    }

    /// Returns the members of a room that have a known address.
    pub async fn reachable_members(
        &self,
        room_name: &str,
    ) -> Vec<(Token, SocketAddr)> {
        self.table.lock().await.reachable_members(room_name)
    }

    /// Number of registered rooms.
    pub async fn room_count(&self) -> usize {
        self.table.lock().await.room_count()
    }

    /// Number of issued sessions.
    pub async fn session_count(&self) -> usize {
        self.table.lock().await.session_count()
    }
}
