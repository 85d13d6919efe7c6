//! Incremental HTTP/1.1 request reader
//!
//! Accumulates bytes from the stream until `httparse` reports a complete
//! header block, then reads the `Content-Length` body and produces an
//! `http::Request`. Pipelined bytes left over after one request stay in the
//! buffer for the next call.

use http::Version;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::callbacks::HttpRequest;
use crate::error::{HttpServerError, Result};

const MAX_HEADERS: usize = 64;

/// Owned pieces of a parsed header block
struct Head {
    header_len: usize,
    method: String,
    path: String,
    version: Version,
    headers: Vec<(String, Vec<u8>)>,
    content_length: usize,
}

/// Read exactly one request from `stream`
///
/// Returns `Ok(None)` when the peer closed the connection cleanly between
/// requests, `Err(IncompleteRequest)` when it closed mid-request, and
/// `Err(BadRequest)` on malformed input.
pub async fn read_request<R>(stream: &mut R, buffer: &mut Vec<u8>) -> Result<Option<HttpRequest>>
where
    R: AsyncRead + Unpin,
{
    let head = loop {
        if let Some(head) = parse_head(buffer)? {
            break head;
        }

        let read = stream.read_buf(buffer).await?;
        if read == 0 {
            if buffer.is_empty() {
                return Ok(None);
            }
            return Err(HttpServerError::IncompleteRequest);
        }
    };

    while buffer.len() < head.header_len + head.content_length {
        let read = stream.read_buf(buffer).await?;
        if read == 0 {
            return Err(HttpServerError::IncompleteRequest);
        }
    }

    let body = buffer[head.header_len..head.header_len + head.content_length].to_vec();
    buffer.drain(..head.header_len + head.content_length);

    let mut builder = http::Request::builder()
        .method(head.method.as_str())
        .uri(head.path.as_str())
        .version(head.version);
    for (name, value) in &head.headers {
        builder = builder.header(name.as_str(), value.as_slice());
    }
    let request = builder
        .body(body)
        .map_err(|e| HttpServerError::BadRequest(e.to_string()))?;

    trace!(method = %request.method(), uri = %request.uri(), "parsed request");
    Ok(Some(request))
}

/// Attempt to parse a complete header block out of `buffer`
fn parse_head(buffer: &[u8]) -> Result<Option<Head>> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut request = httparse::Request::new(&mut headers);

    let header_len = match request.parse(buffer) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(e) => return Err(HttpServerError::BadRequest(e.to_string())),
    };

    // `Complete` guarantees the request line fields are present.
    let method = request.method.unwrap_or_default().to_string();
    let path = request.path.unwrap_or_default().to_string();
    let version = match request.version {
        Some(0) => Version::HTTP_10,
        _ => Version::HTTP_11,
    };

    let mut content_length = 0usize;
    let mut owned_headers = Vec::with_capacity(request.headers.len());
    for header in request.headers.iter() {
        if header.name.eq_ignore_ascii_case("content-length") {
            content_length = std::str::from_utf8(header.value)
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .ok_or_else(|| {
                    HttpServerError::BadRequest("invalid Content-Length".to_string())
                })?;
        }
        owned_headers.push((header.name.to_string(), header.value.to_vec()));
    }

    Ok(Some(Head {
        header_len,
        method,
        path,
        version,
        headers: owned_headers,
        content_length,
    }))
}
