//! WebSocket connection state machine
//!
//! One generic session type covers both transports: the capability interface
//! is `AsyncRead + AsyncWrite`, so the identical framing/read/write/error
//! logic runs over a plain `TcpStream` or a TLS stream. Only session
//! establishment differs: the secure path performs the rustls server
//! handshake before the RFC 6455 upgrade.

use futures::{SinkExt, StreamExt};
use std::io::ErrorKind;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use tungstenite::error::ProtocolError;
use tungstenite::handshake::server::{ErrorResponse, Request};
use tungstenite::Message;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::callbacks::{HandshakeResponse, WebSocketServiceCallbacks};
use crate::error::{Error, ErrorType};

/// `Server:` banner stamped on every upgrade response
pub const SERVER_BANNER: &str = "tungstenite Test WebSocket Server";

/// Unique identifier for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new unique session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of a WebSocket session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, no handshake yet
    Stopped,
    /// Performing the upgrade handshake
    Accepting,
    /// Handshake complete, frame loop running
    Started,
    /// Connection over
    Closed,
}

/// One WebSocket connection, generic over the transport
///
/// Created in `Stopped`, moved through `Accepting` by [`accept`] and into
/// `Started` once the upgrade completes; [`run`] drives the frame loop and
/// leaves the session `Closed`.
///
/// [`accept`]: WebSocketSession::accept
/// [`run`]: WebSocketSession::run
pub struct WebSocketSession<S> {
    id: SessionId,
    stream: Option<WebSocketStream<S>>,
    callbacks: Arc<WebSocketServiceCallbacks>,
    state: SessionState,
}

impl<S> WebSocketSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a session with no transport yet
    pub fn new(callbacks: Arc<WebSocketServiceCallbacks>, id: SessionId) -> Self {
        Self {
            id,
            stream: None,
            callbacks,
            state: SessionState::Stopped,
        }
    }

    /// Perform the WS upgrade handshake on an established transport
    ///
    /// The upgrade response is decorated with the [`SERVER_BANNER`] and
    /// passed through the `on_handshake` callback before it is sent. Returns
    /// `false` after reporting `ErrorType::Connection` when the upgrade
    /// fails.
    pub async fn accept(&mut self, transport: S) -> bool {
        self.state = SessionState::Accepting;

        let decorator_callbacks = Arc::clone(&self.callbacks);
        let decorator = move |_request: &Request, mut response: HandshakeResponse| {
            response.headers_mut().insert(
                http::header::SERVER,
                http::HeaderValue::from_static(SERVER_BANNER),
            );
            if let Some(on_handshake) = &decorator_callbacks.on_handshake {
                on_handshake(&mut response);
            }
            Ok::<_, ErrorResponse>(response)
        };

        match accept_hdr_async(transport, decorator).await {
            Ok(stream) => {
                debug!(session = %self.id, "WebSocket handshake complete");
                self.stream = Some(stream);
                self.state = SessionState::Started;
                if let Some(on_connection) = &self.callbacks.on_connection {
                    on_connection();
                }
                true
            }
            Err(e) => {
                self.state = SessionState::Closed;
                self.callbacks
                    .report(Error::new(e.to_string(), ErrorType::Connection));
                false
            }
        }
    }

    /// Session ID
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Alternate between reading one frame and writing one frame until the
    /// connection closes or errors
    ///
    /// A no-op unless [`accept`](WebSocketSession::accept) succeeded first.
    pub async fn run(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };

        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    trace!(session = %self.id, len = text.len(), "text frame");
                    if let Some(on_message) = &self.callbacks.on_message {
                        on_message(text.clone());
                    }

                    let Some(factory) = &self.callbacks.message_factory else {
                        continue;
                    };
                    let outgoing = factory(text);
                    if !send_frame(&mut stream, &self.callbacks, Message::Text(outgoing)).await {
                        break;
                    }
                }
                Ok(Message::Binary(bytes)) => {
                    trace!(session = %self.id, len = bytes.len(), "binary frame");
                    let Some(factory) = &self.callbacks.binary_message_factory else {
                        continue;
                    };
                    let outgoing = factory(bytes);
                    if !send_frame(&mut stream, &self.callbacks, Message::Binary(outgoing)).await {
                        break;
                    }
                }
                Ok(Message::Ping(payload)) => {
                    if !send_frame(&mut stream, &self.callbacks, Message::Pong(payload)).await {
                        break;
                    }
                }
                Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
                Ok(Message::Close(_)) => {
                    debug!(session = %self.id, "peer closed");
                    break;
                }
                Err(e) => {
                    if !is_benign_disconnect(&e) {
                        self.callbacks
                            .report(Error::new(e.to_string(), ErrorType::Receive));
                    }
                    break;
                }
            }
        }

        self.state = SessionState::Closed;
        debug!(session = %self.id, "WebSocket session closed");
    }
}

/// Write one outgoing frame; returns false when the session must stop
async fn send_frame<S>(
    stream: &mut WebSocketStream<S>,
    callbacks: &WebSocketServiceCallbacks,
    message: Message,
) -> bool
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match stream.send(message).await {
        Ok(()) => true,
        Err(e) => {
            if !is_benign_disconnect(&e) {
                callbacks.report(Error::new(e.to_string(), ErrorType::Send));
            }
            false
        }
    }
}

/// Establish a plain session: upgrade handshake directly on the TCP stream
pub async fn accept_plain(
    transport: TcpStream,
    callbacks: Arc<WebSocketServiceCallbacks>,
    id: SessionId,
) -> Option<WebSocketSession<TcpStream>> {
    let mut session = WebSocketSession::new(callbacks, id);
    session.accept(transport).await.then_some(session)
}

/// Establish a secure session: rustls server handshake, then the upgrade
pub async fn accept_secure(
    transport: TcpStream,
    acceptor: TlsAcceptor,
    callbacks: Arc<WebSocketServiceCallbacks>,
    id: SessionId,
) -> Option<WebSocketSession<TlsStream<TcpStream>>> {
    let tls_stream = match acceptor.accept(transport).await {
        Ok(stream) => stream,
        Err(e) => {
            if !is_benign_io(&e) {
                callbacks.report(Error::new(e.to_string(), ErrorType::Handshake));
            }
            return None;
        }
    };

    let mut session = WebSocketSession::new(callbacks, id);
    session.accept(tls_stream).await.then_some(session)
}

/// Expected teardown errors that are filtered from `on_error`
fn is_benign_disconnect(error: &tungstenite::Error) -> bool {
    use tungstenite::Error as WsError;

    match error {
        WsError::ConnectionClosed | WsError::AlreadyClosed => true,
        WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => true,
        WsError::Io(e) => is_benign_io(e),
        _ => false,
    }
}

/// Reset, abort, and short-read teardown errors at the IO layer
fn is_benign_io(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof
    )
}
