//! Error types for the WebSocket test server

use thiserror::Error as ThisError;

/// Classification of a reported session error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    /// Failure while establishing or accepting a connection
    Connection,
    /// Failure during the TLS handshake
    Handshake,
    /// Failure while reading a frame
    Receive,
    /// Failure while writing a frame
    Send,
}

/// Structured error delivered to the `on_error` callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    /// Human-readable description
    pub message: String,
    /// Where in the session lifecycle the failure occurred
    pub error_type: ErrorType,
}

impl Error {
    /// Create an error for the given lifecycle phase
    pub fn new(message: impl Into<String>, error_type: ErrorType) -> Self {
        Self {
            message: message.into(),
            error_type,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} error: {}", self.error_type, self.message)
    }
}

/// Errors surfaced to the caller from server setup and lifecycle operations
#[derive(ThisError, Debug)]
pub enum WsServerError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS context setup error
    #[error("TLS error: {0}")]
    Tls(#[from] tokio_rustls::rustls::Error),

    /// Embedded certificate bundle could not be parsed
    #[error("invalid embedded key material: {0}")]
    InvalidKeyMaterial(String),

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

/// Result type for WebSocket test server operations
pub type Result<T> = std::result::Result<T, WsServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = Error::new("peer went away", ErrorType::Receive);
        assert_eq!(format!("{}", error), "Receive error: peer went away");
    }

    #[test]
    fn test_error_equality() {
        let a = Error::new("boom", ErrorType::Send);
        let b = Error::new("boom", ErrorType::Send);
        assert_eq!(a, b);
        assert_ne!(a, Error::new("boom", ErrorType::Connection));
    }
}
