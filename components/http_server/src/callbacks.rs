//! User-supplied request callbacks
//!
//! The callback table is populated before `start()` and shared read-only by
//! reference across every session of one server instance. Each callback runs
//! synchronously on the session task that parsed the request.

use std::sync::Arc;

use crate::response::Response;

/// A parsed request as handed to verb callbacks
pub type HttpRequest = http::Request<Vec<u8>>;

/// A verb callback: request in, response out
pub type Handler = Arc<dyn Fn(&HttpRequest) -> Response + Send + Sync>;

/// Per-server callback table, each entry optional
#[derive(Clone, Default)]
pub struct HttpCallbacks {
    /// Invoked for GET requests
    pub on_get: Option<Handler>,

    /// Invoked for OPTIONS requests; when absent a default CORS preflight
    /// response is synthesized
    pub on_options: Option<Handler>,

    /// Invoked for PATCH requests
    pub on_patch: Option<Handler>,

    /// Invoked for CONNECT requests
    pub on_connect: Option<Handler>,

    /// Invoked for TRACE requests
    pub on_trace: Option<Handler>,

    /// Fired after every successfully written response
    pub on_response_sent: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl std::fmt::Debug for HttpCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCallbacks")
            .field("on_get", &self.on_get.is_some())
            .field("on_options", &self.on_options.is_some())
            .field("on_patch", &self.on_patch.is_some())
            .field("on_connect", &self.on_connect.is_some())
            .field("on_trace", &self.on_trace.is_some())
            .field("on_response_sent", &self.on_response_sent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_default_table_is_empty() {
        let callbacks = HttpCallbacks::default();
        assert!(callbacks.on_get.is_none());
        assert!(callbacks.on_options.is_none());
        assert!(callbacks.on_response_sent.is_none());
    }

    #[test]
    fn test_handler_invocation() {
        let mut callbacks = HttpCallbacks::default();
        callbacks.on_get = Some(Arc::new(|_request| {
            Response::text(StatusCode::OK, "from handler")
        }));

        let request = http::Request::builder()
            .method("GET")
            .uri("/")
            .body(Vec::new())
            .unwrap();
        let response = callbacks.on_get.as_ref().unwrap()(&request);
        assert_eq!(response.status, StatusCode::OK);
    }
}
