//! Public API for the in-process test servers
//!
//! This crate bundles the HTTP and WebSocket test servers behind one import
//! for test harnesses that drive both. The servers are programmatic test
//! fixtures: no CLI surface, no persisted state.
//!
//! # Example
//!
//! ```no_run
//! use fixture_api::{HttpServer, Response, WebSocketServer};
//! use http::StatusCode;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut http = HttpServer::new("127.0.0.1", 8080, 2);
//!     http.set_on_get(|_request| Response::text(StatusCode::OK, "hello"));
//!     http.start().await?;
//!
//!     let mut ws = WebSocketServer::new(9001, /*use_tls*/ false);
//!     ws.set_message_factory(|incoming| incoming);
//!     ws.start().await?;
//!
//!     // ... drive test traffic ...
//!
//!     ws.stop().await?;
//!     http.stop().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

// HTTP test server surface
pub use http_server::{
    Body, Handler, HttpCallbacks, HttpRequest, HttpServer, HttpServerError, HttpSession, Response,
    ServerConfig,
};

// WebSocket test server surface
pub use websocket_server::{
    Error as WsError, ErrorType as WsErrorType, SessionId, WebSocketServer,
    WebSocketServiceCallbacks, WsServerError, TEST_CERTIFICATE, TEST_DH_PARAMS, TEST_PRIVATE_KEY,
};

/// Result alias for HTTP fixture operations
pub type HttpResult<T> = http_server::Result<T>;

/// Result alias for WebSocket fixture operations
pub type WsResult<T> = websocket_server::Result<T>;
