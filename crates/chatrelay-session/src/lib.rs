//! Room membership and session tokens for chatrelay.
//!
//! This crate is the single owner of two tables:
//!
//! 1. **Rooms**: room name → member tokens, in join order
//! 2. **Sessions**: token → [`Session`] (room, username, role, address)
//!
//! [`SessionTable`] holds the plain tables and enforces the invariants.
//! [`SessionDirectory`] wraps it behind one lock and is the only way the
//! handshake service and relay engine are allowed to reach it.
//!
//! # How it fits in the stack
//!
//! ```text
//! Handshake service / Relay engine (above)  ← mint tokens, authenticate frames
//!     ↕
//! Session directory (this crate)  ← rooms, sessions, address learning
//!     ↕
//! Protocol (below)  ← provides Token
//! ```

mod directory;
mod error;
mod session;
mod table;

pub use directory::SessionDirectory;
pub use error::DirectoryError;
pub use session::{Role, Session};
pub use table::SessionTable;
