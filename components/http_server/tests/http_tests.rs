//! Integration tests for the HTTP test server
//!
//! Clients are raw TCP sockets so responses can be asserted byte-for-byte.

use http::StatusCode;
use http_server::{HttpServer, Response, ServerConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn connect(server: &HttpServer) -> TcpStream {
    let addr = server.local_addr().expect("server not started");
    TcpStream::connect(("127.0.0.1", addr.port()))
        .await
        .expect("connect failed")
}

/// Read one response: header block, then `Content-Length` body bytes.
/// Returns `None` when the peer closed without sending anything.
async fn read_response(stream: &mut TcpStream) -> Option<(String, Vec<u8>)> {
    let mut buf = Vec::new();

    loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8(buf[..pos].to_vec()).unwrap();
            let content_length = head
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().unwrap())
                })
                .unwrap_or(0);

            let body_start = pos + 4;
            while buf.len() < body_start + content_length {
                let mut chunk = [0u8; 4096];
                let read = stream.read(&mut chunk).await.unwrap();
                assert_ne!(read, 0, "peer closed mid-response");
                buf.extend_from_slice(&chunk[..read]);
            }
            return Some((head, buf[body_start..body_start + content_length].to_vec()));
        }

        let mut chunk = [0u8; 4096];
        let read = stream.read(&mut chunk).await.unwrap();
        if read == 0 {
            assert!(buf.is_empty(), "peer closed mid-header");
            return None;
        }
        buf.extend_from_slice(&chunk[..read]);
    }
}

#[tokio::test]
async fn test_get_round_trip_and_keep_alive() {
    let sent = Arc::new(AtomicUsize::new(0));
    let sent_counter = Arc::clone(&sent);

    let mut server = HttpServer::new("127.0.0.1", 0, 2);
    server.set_on_get(|_request| Response::text(StatusCode::OK, "hello"));
    server.set_on_response_sent(move || {
        sent_counter.fetch_add(1, Ordering::SeqCst);
    });
    server.start().await.unwrap();

    let mut stream = connect(&server).await;

    for _ in 0..2 {
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let (head, body) = read_response(&mut stream).await.unwrap();
        assert!(head.starts_with("HTTP/1.1 200 OK"));
        assert_eq!(body, b"hello");
    }

    assert_eq!(sent.load(Ordering::SeqCst), 2);
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_default_options_preflight() {
    let server = HttpServer::new("127.0.0.1", 0, 1);
    server.start().await.unwrap();

    let mut stream = connect(&server).await;
    stream
        .write_all(b"OPTIONS / HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    let (head, body) = read_response(&mut stream).await.unwrap();
    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert!(head.contains("access-control-allow-methods: GET, POST, DELETE"));
    assert!(head.contains("access-control-expose-headers: Header-expose-allowed"));
    assert!(head.contains("access-control-allow-headers: ValidHeader"));
    assert!(body.is_empty());

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_registered_options_callback_wins() {
    let mut server = HttpServer::new("127.0.0.1", 0, 1);
    server.set_on_options(|_request| Response::text(StatusCode::NO_CONTENT, ""));
    server.start().await.unwrap();

    let mut stream = connect(&server).await;
    stream
        .write_all(b"OPTIONS / HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    let (head, _body) = read_response(&mut stream).await.unwrap();
    assert!(head.starts_with("HTTP/1.1 204 No Content"));
    assert!(!head.contains("access-control-allow-methods"));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_patch_callback_sees_body() {
    let mut server = HttpServer::new("127.0.0.1", 0, 1);
    server.set_on_patch(|request| {
        Response::dynamic(StatusCode::OK, request.body().clone())
    });
    server.start().await.unwrap();

    let mut stream = connect(&server).await;
    stream
        .write_all(b"PATCH /item HTTP/1.1\r\nHost: localhost\r\nContent-Length: 7\r\n\r\npayload")
        .await
        .unwrap();

    let (head, body) = read_response(&mut stream).await.unwrap();
    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert_eq!(body, b"payload");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_trace_callback_dispatch() {
    let mut server = HttpServer::new("127.0.0.1", 0, 1);
    server.set_on_trace(|request| {
        Response::text(StatusCode::OK, format!("traced {}", request.uri().path()))
    });
    server.start().await.unwrap();

    let mut stream = connect(&server).await;
    stream
        .write_all(b"TRACE /probe HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    let (_head, body) = read_response(&mut stream).await.unwrap();
    assert_eq!(body, b"traced /probe");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_delete_closes_without_response() {
    let mut server = HttpServer::new("127.0.0.1", 0, 1);
    server.set_on_get(|_request| Response::text(StatusCode::OK, "unreachable"));
    server.start().await.unwrap();

    let mut stream = connect(&server).await;
    stream
        .write_all(b"DELETE /victim HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    assert!(read_response(&mut stream).await.is_none());

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_need_eof_closes_connection() {
    let mut server = HttpServer::new("127.0.0.1", 0, 1);
    server.set_on_get(|_request| Response::text(StatusCode::OK, "bye").with_close(true));
    server.start().await.unwrap();

    let mut stream = connect(&server).await;
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    let (head, body) = read_response(&mut stream).await.unwrap();
    assert!(head.contains("Connection: close"));
    assert_eq!(body, b"bye");

    // The server closed its end; the next read sees EOF.
    let mut chunk = [0u8; 16];
    assert_eq!(stream.read(&mut chunk).await.unwrap(), 0);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_http10_closes_after_response() {
    let mut server = HttpServer::new("127.0.0.1", 0, 1);
    server.set_on_get(|_request| Response::text(StatusCode::OK, "legacy"));
    server.start().await.unwrap();

    let mut stream = connect(&server).await;
    stream
        .write_all(b"GET / HTTP/1.0\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    let (head, body) = read_response(&mut stream).await.unwrap();
    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert_eq!(body, b"legacy");

    // HTTP/1.0 defaults to close; the next read must see EOF.
    let mut chunk = [0u8; 16];
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut chunk))
        .await
        .expect("connection left open after HTTP/1.0 response")
        .unwrap();
    assert_eq!(read, 0);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_http10_keep_alive_reuses_connection() {
    let mut server = HttpServer::new("127.0.0.1", 0, 1);
    server.set_on_get(|_request| Response::text(StatusCode::OK, "legacy"));
    server.start().await.unwrap();

    let mut stream = connect(&server).await;

    for _ in 0..2 {
        stream
            .write_all(b"GET / HTTP/1.0\r\nHost: localhost\r\nConnection: keep-alive\r\n\r\n")
            .await
            .unwrap();
        let (head, body) = read_response(&mut stream).await.unwrap();
        assert!(head.starts_with("HTTP/1.1 200 OK"));
        assert_eq!(body, b"legacy");
    }

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_post_is_silent_but_session_survives() {
    let mut server = HttpServer::new("127.0.0.1", 0, 1);
    server.set_on_get(|_request| Response::text(StatusCode::OK, "after-post"));
    server.start().await.unwrap();

    let mut stream = connect(&server).await;
    stream
        .write_all(b"POST /ignored HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\n\r\n")
        .await
        .unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    // The only bytes back are the GET's response.
    let (head, body) = read_response(&mut stream).await.unwrap();
    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert_eq!(body, b"after-post");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_clients_no_crosstalk() {
    let mut server = HttpServer::new("127.0.0.1", 0, 2);
    server.set_on_get(|request| {
        Response::text(StatusCode::OK, format!("echo:{}", request.uri().path()))
    });
    server.start().await.unwrap();

    let addr = server.local_addr().unwrap();
    let mut clients = Vec::new();
    for i in 0..4 {
        clients.push(tokio::spawn(async move {
            let mut stream = TcpStream::connect(("127.0.0.1", addr.port())).await.unwrap();
            for round in 0..10 {
                let request = format!("GET /client-{}-{} HTTP/1.1\r\nHost: localhost\r\n\r\n", i, round);
                stream.write_all(request.as_bytes()).await.unwrap();
                let (_head, body) = read_response(&mut stream).await.unwrap();
                assert_eq!(
                    String::from_utf8(body).unwrap(),
                    format!("echo:/client-{}-{}", i, round)
                );
            }
        }));
    }
    for client in clients {
        client.await.unwrap();
    }

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_with_active_sessions() {
    let mut server = HttpServer::new("127.0.0.1", 0, 2);
    server.set_on_get(|_request| Response::text(StatusCode::OK, "ok"));
    server.start().await.unwrap();

    // Leave a connected, idle client in flight.
    let mut stream = connect(&server).await;
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let _ = read_response(&mut stream).await.unwrap();

    server.stop().await.unwrap();
    assert!(!server.is_running());
}

#[tokio::test]
async fn test_idle_timeout_closes_stalled_session() {
    let config = ServerConfig::new(0)
        .with_bind_address("127.0.0.1")
        .with_read_timeout(Duration::from_millis(100));
    let server = HttpServer::with_config(config);
    server.start().await.unwrap();

    let mut stream = connect(&server).await;

    // Send nothing; the server should drop us once the deadline expires.
    let mut chunk = [0u8; 16];
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut chunk))
        .await
        .expect("idle session was not closed")
        .unwrap();
    assert_eq!(read, 0);

    server.stop().await.unwrap();
}
