//! # chatrelay
//!
//! A multi-room chat relay split across two transports:
//!
//! - a reliable **handshake** channel, used once per client to create or
//!   join a room and receive an opaque 255-byte session token, and
//! - an unreliable **relay** channel, where every datagram carries the
//!   token and the server fans the message out to the rest of the room.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatrelay::prelude::*;
//!
//! # async fn run() -> Result<(), ChatRelayError> {
//! let server = ChatRelayServer::builder()
//!     .handshake_addr("127.0.0.1:9001")
//!     .relay_addr("127.0.0.1:9002")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handshake;
mod relay;
mod server;

pub use config::RelayConfig;
pub use error::{ChatRelayError, ConfigError};
pub use relay::{Dispatch, route};
pub use server::{ChatRelayServer, ChatRelayServerBuilder};

/// Everything needed to run a server or talk to one.
pub mod prelude {
    pub use crate::{
        ChatRelayError, ChatRelayServer, ChatRelayServerBuilder, RelayConfig,
    };
    pub use chatrelay_protocol::{
        HandshakeReply, HandshakeRequest, Operation, RelayFrame, RelayReply,
        ReplyFraming, TOKEN_LEN, Token,
    };
    pub use chatrelay_session::{DirectoryError, Role, Session, SessionDirectory};
}
