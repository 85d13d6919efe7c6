//! In-process WebSocket test server
//!
//! This crate provides the WebSocket half of the test fixtures. The server
//! accepts TCP connections on a bound port and, depending on a TLS flag
//! chosen at construction, wraps each one in a plain or TLS-encrypted
//! session that performs the RFC 6455 upgrade handshake and then echoes
//! frames through pluggable message factories.
//!
//! # Example
//!
//! ```no_run
//! use websocket_server::WebSocketServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = WebSocketServer::new(9001, /*use_tls*/ false);
//!     server.set_message_factory(|incoming| incoming);
//!     server.start().await?;
//!
//!     // ... drive test traffic ...
//!
//!     server.stop().await?;
//!     Ok(())
//! }
//! ```

// Public modules
pub mod callbacks;
pub mod error;
pub mod server;
pub mod session;
pub mod tls;

// Re-export main types
pub use callbacks::WebSocketServiceCallbacks;
pub use error::{Error, ErrorType, Result, WsServerError};
pub use server::WebSocketServer;
pub use session::{SessionId, SessionState, WebSocketSession};
pub use tls::{TEST_CERTIFICATE, TEST_DH_PARAMS, TEST_PRIVATE_KEY};
