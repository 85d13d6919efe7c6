//! Typed HTTP response variants
//!
//! [`Body`] is the closed set of wire-format response bodies the fixture can
//! produce; [`Response`] erases the concrete variant behind one uniform
//! "write this to the socket" operation.

use http::header::{HeaderName, HeaderValue, CONNECTION};
use http::{HeaderMap, StatusCode};
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::warn;

use crate::error::Result;

/// Response body variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// No body bytes
    Empty,
    /// In-memory byte body
    Dynamic(Vec<u8>),
    /// Body streamed from a file on disk
    File(PathBuf),
    /// In-memory string body
    Text(String),
}

/// One HTTP response, created fresh per request inside a verb callback and
/// destroyed after the write completes
#[derive(Debug, Clone)]
pub struct Response {
    /// Status code sent on the status line
    pub status: StatusCode,

    /// Response headers
    pub headers: HeaderMap,

    /// Response body
    pub body: Body,

    /// Close the connection after this response (`Connection: close`)
    pub close: bool,
}

impl Response {
    /// Create a response with the given status and body
    pub fn new(status: StatusCode, body: Body) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body,
            close: false,
        }
    }

    /// Create a response with no body
    pub fn empty(status: StatusCode) -> Self {
        Self::new(status, Body::Empty)
    }

    /// Create a response with a string body
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status, Body::Text(body.into()))
    }

    /// Create a response with an in-memory byte body
    pub fn dynamic(status: StatusCode, body: Vec<u8>) -> Self {
        Self::new(status, Body::Dynamic(body))
    }

    /// Create a response whose body is streamed from a file
    pub fn file(status: StatusCode, path: impl Into<PathBuf>) -> Self {
        Self::new(status, Body::File(path.into()))
    }

    /// Add a header; invalid names or values are dropped with a warning
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => warn!("dropping invalid header {}: {}", name, value),
        }
        self
    }

    /// Mark whether the connection should close after this response
    pub fn with_close(mut self, close: bool) -> Self {
        self.close = close;
        self
    }

    /// Whether the session must close the connection after writing this
    /// response (explicit close flag or a `Connection: close` header)
    pub fn need_eof(&self) -> bool {
        if self.close {
            return true;
        }
        self.headers
            .get(CONNECTION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("close"))
            .unwrap_or(false)
    }

    /// Serialize the whole response to the given stream
    pub async fn write_to<W>(&self, stream: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        match &self.body {
            Body::File(path) => {
                let mut file = File::open(path).await?;
                let len = file.metadata().await?.len();
                stream.write_all(&self.head(len)).await?;
                tokio::io::copy(&mut file, stream).await?;
            }
            body => {
                let bytes: &[u8] = match body {
                    Body::Empty => &[],
                    Body::Dynamic(bytes) => bytes,
                    Body::Text(text) => text.as_bytes(),
                    Body::File(_) => unreachable!("file bodies handled above"),
                };
                stream.write_all(&self.head(bytes.len() as u64)).await?;
                stream.write_all(bytes).await?;
            }
        }
        stream.flush().await?;
        Ok(())
    }

    /// Build the status line and header block
    fn head(&self, content_length: u64) -> Vec<u8> {
        let mut head = format!(
            "HTTP/1.1 {} {}\r\n",
            self.status.as_u16(),
            self.status.canonical_reason().unwrap_or("")
        )
        .into_bytes();

        for (name, value) in &self.headers {
            head.extend_from_slice(name.as_str().as_bytes());
            head.extend_from_slice(b": ");
            head.extend_from_slice(value.as_bytes());
            head.extend_from_slice(b"\r\n");
        }

        head.extend_from_slice(format!("Content-Length: {}\r\n", content_length).as_bytes());

        if self.close && !self.headers.contains_key(CONNECTION) {
            head.extend_from_slice(b"Connection: close\r\n");
        }

        head.extend_from_slice(b"\r\n");
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_text_body() {
        let response = Response::text(StatusCode::OK, "hello");
        let mut wire = Vec::new();
        response.write_to(&mut wire).await.unwrap();

        let wire = String::from_utf8(wire).unwrap();
        assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(wire.contains("Content-Length: 5\r\n"));
        assert!(wire.ends_with("\r\n\r\nhello"));
    }

    #[tokio::test]
    async fn test_write_empty_body() {
        let response = Response::empty(StatusCode::NO_CONTENT);
        let mut wire = Vec::new();
        response.write_to(&mut wire).await.unwrap();

        let wire = String::from_utf8(wire).unwrap();
        assert!(wire.starts_with("HTTP/1.1 204 No Content\r\n"));
        assert!(wire.contains("Content-Length: 0\r\n"));
    }

    #[tokio::test]
    async fn test_write_dynamic_body() {
        let response = Response::dynamic(StatusCode::OK, vec![1, 2, 3, 4]);
        let mut wire = Vec::new();
        response.write_to(&mut wire).await.unwrap();

        assert!(wire.ends_with(&[b'\r', b'\n', 1, 2, 3, 4]));
    }

    #[tokio::test]
    async fn test_write_file_body() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"file contents").unwrap();

        let response = Response::file(StatusCode::OK, file.path());
        let mut wire = Vec::new();
        response.write_to(&mut wire).await.unwrap();

        let wire = String::from_utf8(wire).unwrap();
        assert!(wire.contains("Content-Length: 13\r\n"));
        assert!(wire.ends_with("file contents"));
    }

    #[test]
    fn test_need_eof_from_flag() {
        let response = Response::empty(StatusCode::OK).with_close(true);
        assert!(response.need_eof());
    }

    #[test]
    fn test_need_eof_from_header() {
        let response = Response::empty(StatusCode::OK).with_header("Connection", "close");
        assert!(response.need_eof());

        let keep_alive = Response::empty(StatusCode::OK).with_header("Connection", "keep-alive");
        assert!(!keep_alive.need_eof());
    }

    #[test]
    fn test_close_flag_emits_header() {
        let response = Response::empty(StatusCode::OK).with_close(true);
        let head = String::from_utf8(response.head(0)).unwrap();
        assert!(head.contains("Connection: close\r\n"));
    }

    #[test]
    fn test_invalid_header_dropped() {
        let response = Response::empty(StatusCode::OK).with_header("bad name", "value");
        assert!(response.headers.is_empty());
    }
}
