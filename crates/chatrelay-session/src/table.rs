//! The room and session tables.
//!
//! # Concurrency note
//!
//! `SessionTable` is NOT thread-safe by itself. It uses plain `HashMap`s
//! and `&mut self` methods. Shared access goes through
//! [`SessionDirectory`](crate::SessionDirectory), which holds the table
//! behind a single lock so that "add member" and "register session" always
//! happen together.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use chatrelay_protocol::{TOKEN_LEN, Token};
use rand::RngCore;

use crate::{DirectoryError, Role, Session};

/// Rooms, their members, and every issued session.
///
/// ## Invariants
///
/// - Every token in a room's member list has exactly one entry in
///   `sessions`, and that session names the same room.
/// - A room's member list is never empty: the host is inserted with it.
/// - A token is never handed out twice.
#[derive(Debug, Default)]
pub struct SessionTable {
    /// Room name → member tokens in join order. The first is the host.
    rooms: HashMap<String, Vec<Token>>,

    /// Token → session record.
    sessions: HashMap<Token, Session>,
}

impl SessionTable {
    /// Creates empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new room with `username` as its host.
    ///
    /// # Errors
    /// [`DirectoryError::RoomExists`] if the name is taken. No token is
    /// minted in that case.
    pub fn create_room(
        &mut self,
        room_name: &str,
        username: &str,
    ) -> Result<Token, DirectoryError> {
        if self.rooms.contains_key(room_name) {
            return Err(DirectoryError::RoomExists(room_name.to_owned()));
        }

        let token = self.mint_token();
        self.rooms.insert(room_name.to_owned(), vec![token.clone()]);
        self.sessions.insert(
            token.clone(),
            Session::new(room_name, username, Role::Host),
        );

        tracing::info!(room = room_name, %username, %token, "room created");
        Ok(token)
    }

    /// Adds `username` to an existing room as a guest.
    ///
    /// The token is always minted here. Callers have no way to supply one.
    ///
    /// # Errors
    /// [`DirectoryError::RoomNotFound`] if no room has this name.
    pub fn join_room(
        &mut self,
        room_name: &str,
        username: &str,
    ) -> Result<Token, DirectoryError> {
        if !self.rooms.contains_key(room_name) {
            return Err(DirectoryError::RoomNotFound(room_name.to_owned()));
        }

        let token = self.mint_token();
        self.sessions.insert(
            token.clone(),
            Session::new(room_name, username, Role::Guest),
        );
        if let Some(members) = self.rooms.get_mut(room_name) {
            members.push(token.clone());
        }

        tracing::info!(room = room_name, %username, %token, "joined room");
        Ok(token)
    }

    /// Looks up the session bound to `token`.
    pub fn lookup(&self, token: &Token) -> Result<&Session, DirectoryError> {
        self.sessions.get(token).ok_or(DirectoryError::UnknownToken)
    }

    /// Records `address` as where `token`'s session currently lives.
    ///
    /// Overwrites any earlier address. Calling it again with the same
    /// address changes nothing but `last_seen`.
    ///
    /// # Errors
    /// [`DirectoryError::UnknownToken`] if the token was never issued.
    pub fn update_address(
        &mut self,
        token: &Token,
        address: SocketAddr,
    ) -> Result<(), DirectoryError> {
        self.observe(token, address).map(|_| ())
    }

    /// Lookup and address update in one step, for the relay path.
    pub fn observe(
        &mut self,
        token: &Token,
        address: SocketAddr,
    ) -> Result<&Session, DirectoryError> {
        let session = self
            .sessions
            .get_mut(token)
            .ok_or(DirectoryError::UnknownToken)?;

        if session.address != Some(address) {
            tracing::debug!(%token, %address, "learned session address");
            session.address = Some(address);
        }
        session.last_seen = Some(Instant::now());
        Ok(session)
    }

    /// Returns the member tokens of `room_name`, host first.
    ///
    /// Empty if the room doesn't exist.
    pub fn members_of(&self, room_name: &str) -> Vec<Token> {
        self.rooms.get(room_name).cloned().unwrap_or_default()
    }

    /// Returns every member of `room_name` that has a known address.
    ///
    /// Members still waiting for their first relay datagram are skipped.
    pub fn reachable_members(&self, room_name: &str) -> Vec<(Token, SocketAddr)> {
        let Some(members) = self.rooms.get(room_name) else {
            return Vec::new();
        };

        members
            .iter()
            .filter_map(|token| {
                let address = self.sessions.get(token).and_then(|s| s.address);
                if address.is_none() {
                    tracing::debug!(%token, room = room_name, "no address yet, skipping");
                }
                address.map(|addr| (token.clone(), addr))
            })
            .collect()
    }

    /// Number of registered rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of issued sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Generates a token that no session holds yet.
    ///
    /// A collision among 255 random bytes won't happen in practice, but
    /// the uniqueness invariant is cheap to check while we hold the table.
    fn mint_token(&self) -> Token {
        loop {
            let token = generate_token();
            if !self.sessions.contains_key(&token) {
                return token;
            }
        }
    }
}

/// Fills a fresh token from the thread-local CSPRNG.
fn generate_token() -> Token {
    let mut bytes = [0u8; TOKEN_LEN];
    rand::rng().fill_bytes(&mut bytes);
    Token::new(bytes)
}

// =========================================================================
// Tests
// =========================================================================
