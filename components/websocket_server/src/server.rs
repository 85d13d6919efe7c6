//! WebSocket test server: listener and TLS-aware session factory

use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info};

use crate::callbacks::{HandshakeResponse, WebSocketServiceCallbacks};
use crate::error::{Error, ErrorType, Result, WsServerError};
use crate::session::{accept_plain, accept_secure, SessionId};
use crate::tls;

/// WebSocket test server
///
/// Accepts TCP connections on the configured port from a single accept task
/// and, depending on the TLS flag chosen at construction, turns each one
/// into a plain or secure session. Secure sessions use the embedded test
/// certificate bundle from [`crate::tls`].
///
/// # Example
///
/// ```no_run
/// use websocket_server::WebSocketServer;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut server = WebSocketServer::new(9001, false);
/// server.set_message_factory(|incoming| incoming);
/// server.start().await?;
/// # Ok(())
/// # }
/// ```
pub struct WebSocketServer {
    /// Port to bind to (0 selects an ephemeral port)
    port: u16,

    /// Whether accepted connections get the TLS session variant
    use_tls: bool,

    /// Callback table; populated before `start()`, shared read-only afterwards
    callbacks: WebSocketServiceCallbacks,

    /// Liveness registry of spawned session tasks, appended to only from the
    /// accept task
    sessions: Arc<DashMap<SessionId, JoinHandle<()>>>,

    /// Whether the server is currently running
    running: Arc<AtomicBool>,

    /// Actual bound address (relevant with ephemeral ports)
    local_addr: Arc<parking_lot::RwLock<Option<SocketAddr>>>,

    /// Accept task handle (when running)
    accept_handle: Arc<parking_lot::Mutex<Option<JoinHandle<()>>>>,

    /// Shutdown signal sender (when running)
    shutdown: Arc<parking_lot::Mutex<Option<watch::Sender<bool>>>>,
}

impl WebSocketServer {
    /// Create a server for `0.0.0.0:port`, plain or TLS
    pub fn new(port: u16, use_tls: bool) -> Self {
        Self {
            port,
            use_tls,
            callbacks: WebSocketServiceCallbacks::default(),
            sessions: Arc::new(DashMap::new()),
            running: Arc::new(AtomicBool::new(false)),
            local_addr: Arc::new(parking_lot::RwLock::new(None)),
            accept_handle: Arc::new(parking_lot::Mutex::new(None)),
            shutdown: Arc::new(parking_lot::Mutex::new(None)),
        }
    }

    /// Register the callback fired once per established session
    pub fn set_on_connection(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.callbacks.on_connection = Some(Arc::new(f));
    }

    /// Register the callback that may mutate the upgrade response
    pub fn set_on_handshake(&mut self, f: impl Fn(&mut HandshakeResponse) + Send + Sync + 'static) {
        self.callbacks.on_handshake = Some(Arc::new(f));
    }

    /// Register the observer for incoming text frames
    pub fn set_on_message(&mut self, f: impl Fn(String) + Send + Sync + 'static) {
        self.callbacks.on_message = Some(Arc::new(f));
    }

    /// Register the text frame transform
    pub fn set_message_factory(&mut self, f: impl Fn(String) -> String + Send + Sync + 'static) {
        self.callbacks.message_factory = Some(Arc::new(f));
    }

    /// Register the binary frame transform
    pub fn set_binary_message_factory(
        &mut self,
        f: impl Fn(Vec<u8>) -> Vec<u8> + Send + Sync + 'static,
    ) {
        self.callbacks.binary_message_factory = Some(Arc::new(f));
    }

    /// Register the structured error callback
    pub fn set_on_error(&mut self, f: impl Fn(Error) + Send + Sync + 'static) {
        self.callbacks.on_error = Some(Arc::new(f));
    }

    /// Start accepting connections
    ///
    /// Builds the TLS acceptor (TLS variant only), binds the listener, and
    /// spawns the single accept task. Setup failures are mirrored to
    /// `on_error` and propagated to the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is already running, the embedded TLS
    /// bundle cannot be loaded, or the port cannot be bound.
    pub async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(WsServerError::AlreadyRunning);
        }

        let acceptor = if self.use_tls {
            match tls::acceptor() {
                Ok(acceptor) => Some(acceptor),
                Err(e) => {
                    self.running.store(false, Ordering::SeqCst);
                    self.callbacks
                        .report(Error::new(e.to_string(), ErrorType::Connection));
                    return Err(e);
                }
            }
        } else {
            None
        };

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                self.callbacks
                    .report(Error::new(e.to_string(), ErrorType::Connection));
                return Err(e.into());
            }
        };
        let local_addr = listener.local_addr()?;
        *self.local_addr.write() = Some(local_addr);

        info!(
            "WebSocket test server listening on {} (tls: {})",
            local_addr, self.use_tls
        );

        let callbacks = Arc::new(self.callbacks.clone());
        let sessions = Arc::clone(&self.sessions);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        *self.shutdown.lock() = Some(shutdown_tx);

        let handle = tokio::spawn(accept_loop(listener, acceptor, callbacks, sessions, shutdown_rx));
        *self.accept_handle.lock() = Some(handle);

        Ok(())
    }

    /// Stop the server
    ///
    /// Closes the acceptor and joins the accept task; outstanding sessions
    /// are aborted rather than drained.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is not running.
    pub async fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(WsServerError::NotRunning);
        }

        info!("Stopping WebSocket test server");

        if let Some(shutdown) = self.shutdown.lock().take() {
            let _ = shutdown.send(true);
        }

        let accept_handle = self.accept_handle.lock().take();
        if let Some(handle) = accept_handle {
            handle.abort();
            let _ = handle.await;
        }

        for entry in self.sessions.iter() {
            entry.value().abort();
        }
        self.sessions.clear();

        *self.local_addr.write() = None;
        debug!("WebSocket test server stopped");
        Ok(())
    }

    /// Whether the server is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Actual bound address, once running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.read()
    }

    /// Number of sessions still in the liveness registry
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

/// Single accept task: accept, spawn the session, accept again
async fn accept_loop(
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    callbacks: Arc<WebSocketServiceCallbacks>,
    sessions: Arc<DashMap<SessionId, JoinHandle<()>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!("accept task stopping");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let id = SessionId::new();
                    debug!(session = %id, %peer, "accepted connection");

                    let handle = spawn_session(stream, acceptor.clone(), Arc::clone(&callbacks), id, Arc::clone(&sessions));
                    sessions.insert(id, handle);
                }
                Err(e) => {
                    error!("accept failed: {}", e);
                    callbacks.report(Error::new(e.to_string(), ErrorType::Connection));
                    break;
                }
            },
        }
    }
}

/// Spawn the per-connection task for the plain or secure variant
fn spawn_session(
    stream: TcpStream,
    acceptor: Option<TlsAcceptor>,
    callbacks: Arc<WebSocketServiceCallbacks>,
    id: SessionId,
    sessions: Arc<DashMap<SessionId, JoinHandle<()>>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match acceptor {
            Some(acceptor) => {
                if let Some(mut session) = accept_secure(stream, acceptor, callbacks, id).await {
                    session.run().await;
                }
            }
            None => {
                if let Some(mut session) = accept_plain(stream, callbacks, id).await {
                    session.run().await;
                }
            }
        }
        sessions.remove(&id);
    })
}
