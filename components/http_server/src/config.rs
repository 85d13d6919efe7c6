//! Server configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the HTTP test server
///
/// The tuple (bind address, port, concurrency) is fixed at construction and
/// never mutated while the server runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (default 0.0.0.0)
    pub bind_address: String,

    /// Port to bind to (0 selects an ephemeral port)
    pub port: u16,

    /// Number of concurrent accept workers
    pub concurrency: usize,

    /// Per-session idle read timeout; `None` disables the deadline entirely
    pub read_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 0,
            concurrency: 1,
            read_timeout: None,
        }
    }
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Set bind address
    pub fn with_bind_address(mut self, address: impl Into<String>) -> Self {
        self.bind_address = address.into();
        self
    }

    /// Set the number of accept workers
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the per-session idle read timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.port, 0);
        assert_eq!(config.concurrency, 1);
        assert!(config.read_timeout.is_none());
    }

    #[test]
    fn test_builder_pattern() {
        let config = ServerConfig::new(8080)
            .with_bind_address("127.0.0.1")
            .with_concurrency(4)
            .with_read_timeout(Duration::from_secs(5));

        assert_eq!(config.port, 8080);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.read_timeout, Some(Duration::from_secs(5)));
    }
}
