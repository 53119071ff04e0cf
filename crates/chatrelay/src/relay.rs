//! The relay engine: authenticate datagrams by token, learn addresses,
//! fan chat lines out to the room.
//!
//! Routing is split from I/O. [`route`] decides what to do with one
//! datagram and returns a [`Dispatch`]; [`RelayEngine`] owns the socket,
//! runs the receive loop, and carries the dispatch out without ever
//! awaiting a send on the receive path.

use std::net::SocketAddr;
use std::sync::Arc;

use chatrelay_protocol::{
    INVALID_TOKEN_NOTICE, ROOM_MISMATCH_NOTICE, RelayFrame, RelayReply,
};
use chatrelay_session::{DirectoryError, SessionDirectory};
use chatrelay_transport::DatagramSocket;
use futures_util::future::join_all;

use crate::RelayConfig;
use crate::server::ServerState;

/// What to send in response to one datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Send nothing. Used for frames that don't parse.
    Drop,

    /// Send one notice back to the datagram's source.
    Reply { to: SocketAddr, payload: Vec<u8> },

    /// Send the same payload to every listed address.
    FanOut {
        payload: Vec<u8>,
        recipients: Vec<SocketAddr>,
    },
}

/// Decides what one datagram from `source` should produce.
///
/// 1. Undecodable frames are dropped without a reply.
/// 2. Unknown tokens get exactly one [`INVALID_TOKEN_NOTICE`] back.
/// 3. Known tokens have their session address set to `source`.
/// 4. The message is formatted as `"<username>: <message>"` and sent to
///    every member of the room *named in the frame* that has an address.
///
/// With `enforce_room_binding`, a frame naming a room other than its
/// token's gets a [`ROOM_MISMATCH_NOTICE`] instead of step 4. The address
/// is still learned, since the token itself was valid.
pub async fn route(
    directory: &SessionDirectory,
    config: &RelayConfig,
    data: &[u8],
    source: SocketAddr,
) -> Dispatch {
    let frame = match RelayFrame::decode(data) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(%source, error = %e, "dropping relay datagram");
            return Dispatch::Drop;
        }
    };

    let session = match frame.token() {
        Some(token) => directory
            .observe(&token, source)
            .await
            .map(|session| (token, session)),
        None => Err(DirectoryError::UnknownToken),
    };
    let (token, session) = match session {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!(
                %source,
                room = frame.room_name,
                error = %e,
                "rejected relay datagram"
            );
            return notice(config, source, INVALID_TOKEN_NOTICE);
        }
    };

    if config.enforce_room_binding && session.room_name != frame.room_name {
        tracing::warn!(
            %token,
            bound = %session.room_name,
            named = frame.room_name,
            "token posted to a foreign room"
        );
        return notice(config, source, ROOM_MISMATCH_NOTICE);
    }

    let line = format!("{}: {}", session.username, frame.message);
    let recipients: Vec<SocketAddr> = directory
        .reachable_members(frame.room_name)
        .await
        .into_iter()
        .filter(|(member, _)| config.echo_to_sender || *member != token)
        .map(|(_, address)| address)
        .collect();

    tracing::debug!(
        %token,
        room = frame.room_name,
        recipients = recipients.len(),
        "relaying message"
    );

    Dispatch::FanOut {
        payload: config.reply_framing.encode_relay(&RelayReply::Chat(line)),
        recipients,
    }
}

fn notice(config: &RelayConfig, to: SocketAddr, text: &str) -> Dispatch {
    Dispatch::Reply {
        to,
        payload: config
            .reply_framing
            .encode_relay(&RelayReply::Notice(text.to_string())),
    }
}

/// Owns the relay socket and runs the receive loop.
pub(crate) struct RelayEngine {
    socket: DatagramSocket,
    state: Arc<ServerState>,
}

impl RelayEngine {
    pub(crate) fn new(socket: DatagramSocket, state: Arc<ServerState>) -> Self {
        Self { socket, state }
    }

    /// Receives datagrams forever.
    ///
    /// Receive errors (e.g. ICMP port-unreachable surfacing as a reset on
    /// some platforms) are logged and the loop carries on.
    pub(crate) async fn run(self) {
        let mut buf = vec![0u8; self.state.config.max_datagram_size];
        loop {
            let (len, source) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    tracing::warn!(error = %e, "relay receive failed");
                    continue;
                }
            };

            let dispatch = route(
                &self.state.directory,
                &self.state.config,
                &buf[..len],
                source,
            )
            .await;
            self.send(dispatch);
        }
    }

    /// Hands the dispatch to its own task so the receive loop never waits
    /// on a peer. Within a fan-out all sends run concurrently.
    fn send(&self, dispatch: Dispatch) {
        match dispatch {
            Dispatch::Drop => {}
            Dispatch::Reply { to, payload } => {
                let socket = self.socket.clone();
                tokio::spawn(async move {
                    if let Err(e) = socket.send_to(&payload, to).await {
                        tracing::warn!(%to, error = %e, "notice send failed");
                    }
                });
            }
            Dispatch::FanOut {
                payload,
                recipients,
            } => {
                if recipients.is_empty() {
                    return;
                }
                let socket = self.socket.clone();
                tokio::spawn(async move {
                    let sends = recipients
                        .iter()
                        .map(|to| socket.send_to(&payload, *to));
                    let results = join_all(sends).await;
                    for (to, result) in recipients.iter().zip(results) {
                        if let Err(e) = result {
                            tracing::warn!(%to, error = %e, "relay send failed");
                        }
                    }
                });
            }
        }
    }
}
