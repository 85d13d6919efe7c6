//! User-supplied session callbacks
//!
//! Registered before `start()` and shared read-only by reference across all
//! sessions of one server. Every callback runs synchronously on the session
//! task that read the triggering frame.

use std::sync::Arc;

use crate::error::Error;

/// The WS upgrade response handed to the handshake callback
pub type HandshakeResponse = http::Response<()>;

/// Per-server callback table, each entry optional
#[derive(Clone, Default)]
pub struct WebSocketServiceCallbacks {
    /// Fired once per successfully established session
    pub on_connection: Option<Arc<dyn Fn() + Send + Sync>>,

    /// May mutate the upgrade response before it is sent
    pub on_handshake: Option<Arc<dyn Fn(&mut HandshakeResponse) + Send + Sync>>,

    /// Observes every incoming text frame
    pub on_message: Option<Arc<dyn Fn(String) + Send + Sync>>,

    /// Transforms an incoming text frame into the outgoing frame; absence
    /// means "discard the frame, keep reading"
    pub message_factory: Option<Arc<dyn Fn(String) -> String + Send + Sync>>,

    /// Transforms an incoming binary frame into the outgoing frame; same
    /// discard rule as the text factory
    pub binary_message_factory: Option<Arc<dyn Fn(Vec<u8>) -> Vec<u8> + Send + Sync>>,

    /// Receives structured errors for any non-benign failure
    pub on_error: Option<Arc<dyn Fn(Error) + Send + Sync>>,
}

impl WebSocketServiceCallbacks {
    /// Report an error through `on_error`, when registered
    pub(crate) fn report(&self, error: Error) {
        if let Some(on_error) = &self.on_error {
            on_error(error);
        }
    }
}

impl std::fmt::Debug for WebSocketServiceCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketServiceCallbacks")
            .field("on_connection", &self.on_connection.is_some())
            .field("on_handshake", &self.on_handshake.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("message_factory", &self.message_factory.is_some())
            .field(
                "binary_message_factory",
                &self.binary_message_factory.is_some(),
            )
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_default_table_is_empty() {
        let callbacks = WebSocketServiceCallbacks::default();
        assert!(callbacks.on_connection.is_none());
        assert!(callbacks.message_factory.is_none());
        assert!(callbacks.on_error.is_none());
    }

    #[test]
    fn test_report_without_callback_is_silent() {
        let callbacks = WebSocketServiceCallbacks::default();
        callbacks.report(Error::new("ignored", ErrorType::Receive));
    }

    #[test]
    fn test_report_invokes_callback() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);

        let mut callbacks = WebSocketServiceCallbacks::default();
        callbacks.on_error = Some(Arc::new(move |error| {
            assert_eq!(error.error_type, ErrorType::Send);
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        callbacks.report(Error::new("boom", ErrorType::Send));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
