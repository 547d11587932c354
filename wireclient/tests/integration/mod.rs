#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end tests driving `Pool`/`HttpProxy` against scripted, raw TCP
//! listeners standing in for real servers and proxies.

mod pool_http1_test;
mod proxy_test;
mod queuing_test;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

static NEXT_PORT: AtomicU16 = AtomicU16::new(31000);

pub fn get_free_port() -> u16 {
    loop {
        let port = NEXT_PORT.fetch_add(1, Ordering::Relaxed);
        if std::net::TcpListener::bind(("127.0.0.1", port)).is_ok() {
            return port;
        }
    }
}

pub async fn local_addr(port: u16) -> SocketAddr {
    format!("127.0.0.1:{port}").parse().unwrap()
}

/// Read one HTTP/1.1 request off `socket` (headers + body, if
/// `Content-Length` was sent) and return the raw header block as text.
pub async fn read_request_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
            // Drain any announced body so a keep-alive connection lines
            // up for the next request.
            let head = String::from_utf8_lossy(&buf[..pos]).into_owned();
            if let Some(len) = content_length(&head) {
                let already = buf.len() - (pos + 4);
                let mut remaining = len.saturating_sub(already);
                while remaining > 0 {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    remaining = remaining.saturating_sub(n);
                }
            }
            return head;
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn content_length(head: &str) -> Option<usize> {
    head.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Serve `responses` in order over one accepted connection, one per
/// request on that socket (so callers can script keep-alive behavior by
/// omitting `Connection: close` on all but the last).
pub fn spawn_scripted_server(port: u16, responses: Vec<&'static str>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let listener = TcpListener::bind(("127.0.0.1", port)).await.expect("bind scripted server");
        let (mut socket, _) = listener.accept().await.expect("accept");
        for response in responses {
            let head = read_request_head(&mut socket).await;
            if head.is_empty() {
                break;
            }
            socket.write_all(response.as_bytes()).await.expect("write response");
        }
    })
}
