//! Error types for the HTTP test server

use thiserror::Error;

/// Errors that can occur in the HTTP test server
#[derive(Error, Debug)]
pub enum HttpServerError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP type error
    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),

    /// Malformed request on the wire
    #[error("malformed request: {0}")]
    BadRequest(String),

    /// Connection closed in the middle of a request
    #[error("connection closed mid-request")]
    IncompleteRequest,

    /// Verb with no dispatch path
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    /// Server already started
    #[error("server is already running")]
    AlreadyRunning,

    /// Server not started
    #[error("server is not running")]
    NotRunning,

    /// Other errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for HTTP test server operations
pub type Result<T> = std::result::Result<T, HttpServerError>;
