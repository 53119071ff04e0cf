//! Error types for the session directory.

/// Errors returned by directory operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// A room with this name is already registered.
    #[error("room {0:?} already exists")]
    RoomExists(String),

    /// No room with this name is registered.
    #[error("room {0:?} does not exist")]
    RoomNotFound(String),

    /// The token was never issued by this directory.
    #[error("unknown session token")]
    UnknownToken,
}
