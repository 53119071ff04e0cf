//! The handshake service: one request, one reply, then close.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`], so a slow or silent client only ever stalls
//! itself. The flow is:
//!   1. Read the 32-byte header, then exactly the body it declares
//!   2. Create or join the room through the session directory
//!   3. Send the token (or an error text) and close

use std::sync::Arc;

use chatrelay_protocol::{
    HANDSHAKE_HEADER_LEN, HandshakeHeader, HandshakeReply, HandshakeRequest,
    INVALID_TOKEN_NOTICE, Operation, ROOM_EXISTS_NOTICE, ROOM_NOT_FOUND_NOTICE,
};
use chatrelay_session::DirectoryError;
use chatrelay_transport::{Connection, TcpTransport, Transport, TransportError};

use crate::ChatRelayError;
use crate::server::ServerState;

/// Accepts handshake connections forever, one task per connection.
pub(crate) async fn accept_loop(mut transport: TcpTransport, state: Arc<ServerState>) {
    loop {
        match transport.accept().await {
            Ok(conn) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let conn_id = conn.id();
                    let peer = conn.peer_addr();
                    if let Err(e) = handle_connection(conn, state).await {
                        tracing::debug!(
                            %conn_id,
                            %peer,
                            error = %e,
                            "handshake aborted"
                        );
                    }
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "accept failed");
            }
        }
    }
}

/// Handles a single handshake connection from accept to close.
///
/// Malformed requests and unknown operation codes end the connection
/// without a reply and come back as `Err`; refusals from the directory
/// (room exists / not found) are replied to and count as `Ok`.
pub(crate) async fn handle_connection<C>(
    conn: C,
    state: Arc<ServerState>,
) -> Result<(), ChatRelayError>
where
    C: Connection<Error = TransportError>,
{
    let request = match state.config.handshake_timeout() {
        Some(limit) => tokio::time::timeout(
            limit,
            read_request(&conn, state.config.max_username_len),
        )
        .await
        .map_err(|_| ChatRelayError::HandshakeTimeout(limit))?,
        None => read_request(&conn, state.config.max_username_len).await,
    };

    let request = match request {
        Ok(request) => request,
        Err(e) => {
            // Best effort: the peer may already be gone.
            let _ = conn.close().await;
            return Err(e);
        }
    };

    let conn_id = conn.id();
    tracing::debug!(
        %conn_id,
        operation = %request.operation,
        room = %request.room_name,
        username = %request.username,
        "handshake request"
    );

    let reply = register(&state, &request).await;
    let bytes = state.config.reply_framing.encode_handshake(&reply);
    conn.send(&bytes).await?;
    conn.close().await?;
    Ok(())
}

/// Reads one request: fixed header, then the body it declares.
async fn read_request<C>(
    conn: &C,
    max_username_len: usize,
) -> Result<HandshakeRequest, ChatRelayError>
where
    C: Connection<Error = TransportError>,
{
    let header_bytes = conn.recv_exact(HANDSHAKE_HEADER_LEN).await?;
    let header = HandshakeHeader::decode(&header_bytes, max_username_len)?;
    let body = conn.recv_exact(header.body_len()).await?;
    Ok(HandshakeRequest::from_parts(header, &body)?)
}

/// Applies the request to the directory and turns the outcome into a reply.
async fn register(state: &ServerState, request: &HandshakeRequest) -> HandshakeReply {
    let directory = &state.directory;
    let result = match request.operation {
        Operation::Create => {
            directory
                .create_room(&request.room_name, &request.username)
                .await
        }
        Operation::Join => {
            directory
                .join_room(&request.room_name, &request.username)
                .await
        }
    };

    match result {
        Ok(token) => HandshakeReply::Token(token),
        Err(e) => {
            tracing::info!(
                room = %request.room_name,
                username = %request.username,
                error = %e,
                "handshake refused"
            );
            HandshakeReply::Error(refusal_text(&e).to_string())
        }
    }
}

fn refusal_text(error: &DirectoryError) -> &'static str {
    match error {
        DirectoryError::RoomExists(_) => ROOM_EXISTS_NOTICE,
        DirectoryError::RoomNotFound(_) => ROOM_NOT_FOUND_NOTICE,
        DirectoryError::UnknownToken => INVALID_TOKEN_NOTICE,
    }
}

#[cfg(test)]
mod tests {
    //! Handler tests against an in-memory `Connection`.

    use std::net::SocketAddr;
    use std::sync::Mutex;
    use std::time::Duration;

    use chatrelay_protocol::{ProtocolError, ReplyFraming, TOKEN_LEN, Token};
    use chatrelay_session::{Role, SessionDirectory};
    use chatrelay_transport::ConnectionId;

    use super::*;
    use crate::RelayConfig;

    /// A connection that serves `input` and records what the handler sends.
    ///
    /// With `stall` set, reads past the end of `input` never complete,
    /// like a client that stops typing. Clones share the same buffers.
    #[derive(Clone)]
    struct MockConnection {
        inner: Arc<MockInner>,
    }

    struct MockInner {
        input: Mutex<Vec<u8>>,
        sent: Mutex<Vec<u8>>,
        closed: Mutex<bool>,
        stall: bool,
    }

    impl MockConnection {
        fn new(input: Vec<u8>, stall: bool) -> Self {
            Self {
                inner: Arc::new(MockInner {
                    input: Mutex::new(input),
                    sent: Mutex::new(Vec::new()),
                    closed: Mutex::new(false),
                    stall,
                }),
            }
        }

        fn sent(&self) -> Vec<u8> {
            self.inner.sent.lock().unwrap().clone()
        }

        fn closed(&self) -> bool {
            *self.inner.closed.lock().unwrap()
        }
    }

    impl Connection for MockConnection {
        type Error = TransportError;

        async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
            self.inner.sent.lock().unwrap().extend_from_slice(data);
            Ok(())
        }

        async fn recv_exact(&self, len: usize) -> Result<Vec<u8>, Self::Error> {
            let chunk: Option<Vec<u8>> = {
                let mut input = self.inner.input.lock().unwrap();
                (input.len() >= len).then(|| input.drain(..len).collect())
            };
            match chunk {
                Some(chunk) => Ok(chunk),
                None if self.inner.stall => std::future::pending().await,
                None => Err(TransportError::ConnectionClosed("eof".into())),
            }
        }

        async fn close(&self) -> Result<(), Self::Error> {
            *self.inner.closed.lock().unwrap() = true;
            Ok(())
        }

        fn id(&self) -> ConnectionId {
            ConnectionId::new(1)
        }

        fn peer_addr(&self) -> SocketAddr {
            SocketAddr::from(([127, 0, 0, 1], 50000))
        }
    }

    fn state_with(config: RelayConfig) -> Arc<ServerState> {
        Arc::new(ServerState {
            directory: SessionDirectory::new(),
            config,
        })
    }

    fn state() -> Arc<ServerState> {
        state_with(RelayConfig::default())
    }

    fn request(operation: Operation, room: &str, user: &str) -> Vec<u8> {
        HandshakeRequest {
            operation,
            room_name: room.into(),
            username: user.into(),
        }
        .encode()
        .unwrap()
    }

    async fn run(
        state: &Arc<ServerState>,
        input: Vec<u8>,
    ) -> (MockConnection, Result<(), ChatRelayError>) {
        let conn = MockConnection::new(input, false);
        let result = handle_connection(conn.clone(), Arc::clone(state)).await;
        (conn, result)
    }

    #[tokio::test]
    async fn test_create_replies_with_raw_token_and_closes() {
        let state = state();

        let (conn, result) =
            run(&state, request(Operation::Create, "lobby", "alice")).await;

        result.expect("handshake should succeed");
        let sent = conn.sent();
        assert_eq!(sent.len(), TOKEN_LEN);
        assert!(conn.closed());

        let token = Token::from_slice(&sent).unwrap();
        let session = state.directory.lookup(&token).await.unwrap();
        assert_eq!(session.role, Role::Host);
        assert_eq!(session.username, "alice");
    }

    #[tokio::test]
    async fn test_create_existing_room_replies_error_text() {
        let state = state();
        run(&state, request(Operation::Create, "lobby", "alice")).await.1.unwrap();

        let (conn, result) =
            run(&state, request(Operation::Create, "lobby", "mallory")).await;

        result.expect("a refusal is still a completed handshake");
        assert_eq!(conn.sent(), ROOM_EXISTS_NOTICE.as_bytes());
        assert_eq!(state.directory.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_join_missing_room_replies_error_text() {
        let state = state();

        let (conn, result) =
            run(&state, request(Operation::Join, "nowhere", "bob")).await;

        result.unwrap();
        assert_eq!(conn.sent(), ROOM_NOT_FOUND_NOTICE.as_bytes());
        assert_eq!(state.directory.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_join_existing_room_adds_guest() {
        let state = state();
        run(&state, request(Operation::Create, "lobby", "alice")).await.1.unwrap();

        let (conn, result) =
            run(&state, request(Operation::Join, "lobby", "bob")).await;

        result.unwrap();
        let token = Token::from_slice(&conn.sent()).expect("raw token reply");
        assert_eq!(state.directory.members_of("lobby").await.len(), 2);
        assert_eq!(state.directory.lookup(&token).await.unwrap().role, Role::Guest);
    }

    #[tokio::test]
    async fn test_tagged_framing_prefixes_status_byte() {
        let state = state_with(RelayConfig {
            reply_framing: ReplyFraming::Tagged,
            ..RelayConfig::default()
        });

        let (conn, _) =
            run(&state, request(Operation::Join, "nowhere", "bob")).await;

        let reply = ReplyFraming::Tagged.decode_handshake(&conn.sent()).unwrap();
        assert_eq!(reply, HandshakeReply::Error(ROOM_NOT_FOUND_NOTICE.into()));
    }

    #[tokio::test]
    async fn test_unknown_operation_closes_without_reply() {
        let state = state();
        let mut bytes = request(Operation::Create, "lobby", "alice");
        bytes[1] = 9;

        let (conn, result) = run(&state, bytes).await;

        assert!(matches!(
            result,
            Err(ChatRelayError::Protocol(ProtocolError::UnsupportedOperation(9)))
        ));
        assert!(conn.sent().is_empty());
        assert!(conn.closed());
        assert_eq!(state.directory.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_truncated_body_is_transport_error() {
        let state = state();
        let mut bytes = request(Operation::Create, "lobby", "alice");
        bytes.truncate(bytes.len() - 2);

        let (conn, result) = run(&state, bytes).await;

        assert!(matches!(result, Err(ChatRelayError::Transport(_))));
        assert!(conn.sent().is_empty());
    }

    #[test]
    fn test_refusal_text_uses_protocol_notices() {
        assert_eq!(
            refusal_text(&DirectoryError::RoomExists("lobby".into())),
            ROOM_EXISTS_NOTICE
        );
        assert_eq!(
            refusal_text(&DirectoryError::RoomNotFound("lobby".into())),
            ROOM_NOT_FOUND_NOTICE
        );
        assert_eq!(
            refusal_text(&DirectoryError::UnknownToken),
            INVALID_TOKEN_NOTICE
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_client_times_out() {
        let state = state_with(RelayConfig {
            handshake_timeout_ms: 100,
            ..RelayConfig::default()
        });
        let conn = MockConnection::new(Vec::new(), true);

        let result = handle_connection(conn, state).await;

        assert!(matches!(
            result,
            Err(ChatRelayError::HandshakeTimeout(d)) if d == Duration::from_millis(100)
        ));
    }
}
