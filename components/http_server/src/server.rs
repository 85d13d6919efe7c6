//! HTTP test server: listener and session factory

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::callbacks::{HttpCallbacks, HttpRequest};
use crate::config::ServerConfig;
use crate::error::{HttpServerError, Result};
use crate::response::Response;
use crate::session::HttpSession;

/// HTTP test server
///
/// Owns a listening socket and a configurable number of accept workers.
/// Every accepted connection becomes an [`HttpSession`] bound to the server's
/// shared callback table.
///
/// # Example
///
/// ```no_run
/// use http_server::{HttpServer, Response};
/// use http::StatusCode;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut server = HttpServer::new("127.0.0.1", 8080, 2);
/// server.set_on_get(|_request| Response::text(StatusCode::OK, "hello"));
/// server.start().await?;
/// # Ok(())
/// # }
/// ```
pub struct HttpServer {
    /// Server configuration
    config: ServerConfig,

    /// Callback table; populated before `start()`, shared read-only afterwards
    callbacks: HttpCallbacks,

    /// Whether the server is currently running
    running: Arc<AtomicBool>,

    /// Actual bound address (relevant with ephemeral ports)
    local_addr: Arc<parking_lot::RwLock<Option<SocketAddr>>>,

    /// Accept worker handles (when running)
    workers: Arc<parking_lot::Mutex<Vec<JoinHandle<()>>>>,

    /// Shutdown signal sender (when running)
    shutdown: Arc<parking_lot::Mutex<Option<watch::Sender<bool>>>>,
}

impl HttpServer {
    /// Create a server bound to `address:port` with `concurrency` accept
    /// workers
    pub fn new(address: impl Into<String>, port: u16, concurrency: usize) -> Self {
        Self::with_config(
            ServerConfig::new(port)
                .with_bind_address(address)
                .with_concurrency(concurrency),
        )
    }

    /// Create a server bound to `0.0.0.0:port`
    pub fn with_port(port: u16, concurrency: usize) -> Self {
        Self::new("0.0.0.0", port, concurrency)
    }

    /// Create a server from a full configuration
    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            config,
            callbacks: HttpCallbacks::default(),
            running: Arc::new(AtomicBool::new(false)),
            local_addr: Arc::new(parking_lot::RwLock::new(None)),
            workers: Arc::new(parking_lot::Mutex::new(Vec::new())),
            shutdown: Arc::new(parking_lot::Mutex::new(None)),
        }
    }

    /// Register the GET callback
    pub fn set_on_get(&mut self, f: impl Fn(&HttpRequest) -> Response + Send + Sync + 'static) {
        self.callbacks.on_get = Some(Arc::new(f));
    }

    /// Register the OPTIONS callback
    pub fn set_on_options(&mut self, f: impl Fn(&HttpRequest) -> Response + Send + Sync + 'static) {
        self.callbacks.on_options = Some(Arc::new(f));
    }

    /// Register the PATCH callback
    pub fn set_on_patch(&mut self, f: impl Fn(&HttpRequest) -> Response + Send + Sync + 'static) {
        self.callbacks.on_patch = Some(Arc::new(f));
    }

    /// Register the CONNECT callback
    pub fn set_on_connect(&mut self, f: impl Fn(&HttpRequest) -> Response + Send + Sync + 'static) {
        self.callbacks.on_connect = Some(Arc::new(f));
    }

    /// Register the TRACE callback
    pub fn set_on_trace(&mut self, f: impl Fn(&HttpRequest) -> Response + Send + Sync + 'static) {
        self.callbacks.on_trace = Some(Arc::new(f));
    }

    /// Register the callback fired after every successfully written response
    pub fn set_on_response_sent(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.callbacks.on_response_sent = Some(Arc::new(f));
    }

    /// Start accepting connections
    ///
    /// Binds the listener and spawns the configured number of accept workers.
    /// Bind and listen failures propagate to the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is already running or if the address
    /// cannot be bound.
    pub async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(HttpServerError::AlreadyRunning);
        }

        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                HttpServerError::Other(anyhow::anyhow!("Invalid address: {}", e))
            })?;

        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };
        let local_addr = listener.local_addr()?;
        *self.local_addr.write() = Some(local_addr);

        info!("HTTP test server listening on {}", local_addr);

        let listener = Arc::new(listener);
        let callbacks = Arc::new(self.callbacks.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        *self.shutdown.lock() = Some(shutdown_tx);

        let mut workers = self.workers.lock();
        for worker in 0..self.config.concurrency.max(1) {
            let listener = Arc::clone(&listener);
            let callbacks = Arc::clone(&callbacks);
            let shutdown = shutdown_rx.clone();
            let read_timeout = self.config.read_timeout;

            workers.push(tokio::spawn(accept_loop(
                worker,
                listener,
                callbacks,
                shutdown,
                read_timeout,
            )));
        }

        Ok(())
    }

    /// Stop the server
    ///
    /// Signals shutdown, then joins every accept worker. In-flight sessions
    /// are abandoned rather than drained.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is not running.
    pub async fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(HttpServerError::NotRunning);
        }

        info!("Stopping HTTP test server");
        self.halt().await;
        Ok(())
    }

    /// Stop the server; no-op when it is already stopped
    pub async fn abort(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.halt().await;
    }

    async fn halt(&self) {
        if let Some(shutdown) = self.shutdown.lock().take() {
            let _ = shutdown.send(true);
        }

        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            worker.abort();
            let _ = worker.await;
        }

        *self.local_addr.write() = None;
        debug!("HTTP test server stopped");
    }

    /// Whether the server is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Actual bound address, once running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.read()
    }
}

/// One accept worker: accept, hand off to a session task, accept again
async fn accept_loop(
    worker: usize,
    listener: Arc<TcpListener>,
    callbacks: Arc<HttpCallbacks>,
    mut shutdown: watch::Receiver<bool>,
    read_timeout: Option<std::time::Duration>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!(worker, "accept worker stopping");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(worker, %peer, "accepted connection");
                    let session =
                        HttpSession::new(stream, peer, Arc::clone(&callbacks), read_timeout);
                    let shutdown = shutdown.clone();
                    tokio::spawn(session.run(shutdown));
                }
                Err(e) => {
                    // No retry: a failed accept ends this worker.
                    error!(worker, "accept failed: {}", e);
                    break;
                }
            },
        }
    }
}
