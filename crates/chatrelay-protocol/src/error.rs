//! Error types for the protocol layer.

/// Errors produced while decoding or encoding wire data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The bytes don't form a valid header, frame, or reply.
    ///
    /// Covers truncated input, declared lengths that overrun the buffer,
    /// non-UTF-8 text, a non-zero reserved byte, and oversized fields.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The handshake header named an operation code we don't know.
    #[error("unsupported operation code {0}")]
    UnsupportedOperation(u8),
}
