//! In-process HTTP/1.1 test server
//!
//! This crate provides the HTTP half of the test fixtures used to drive
//! integration tests against networking modules. The server accepts
//! connections on a bound address, runs one session per connection, and
//! dispatches each parsed request to a user-registered callback by verb.
//!
//! # Example
//!
//! ```no_run
//! use http_server::{HttpServer, Response};
//! use http::StatusCode;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = HttpServer::new("127.0.0.1", 8080, 2);
//!     server.set_on_get(|_request| Response::text(StatusCode::OK, "hello"));
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
pub mod config;
pub mod error;
pub mod parser;
pub mod response;
pub mod server;
pub mod session;

// Re-export main types
pub use callbacks::{Handler, HttpCallbacks, HttpRequest};
pub use config::ServerConfig;
pub use error::{HttpServerError, Result};
pub use response::{Body, Response};
pub use server::HttpServer;
pub use session::{HttpSession, SessionState};
