use super::{get_free_port, local_addr, read_request_head};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use wireclient_common::{PoolConfig, TimeoutConfig};
use wireclient_pool::{Pool, PoolOptions};
use wireclient_types::{Headers, Request, Url};

const OK_RESPONSE: &str = "HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 2\r\n\r\nok";

/// With `max_connections == 1`, a second request to a *different* origin
/// must queue behind the first and only get served once the first
/// connection's response body is closed and assignment re-runs.
#[tokio::test]
async fn second_origin_waits_for_capacity_under_max_connections() {
    let port_a = get_free_port();
    let port_b = get_free_port();
    let addr_a = local_addr(port_a).await;
    let addr_b = local_addr(port_b).await;

    let server_a = tokio::spawn(async move {
        let listener = TcpListener::bind(addr_a).await.unwrap();
        let (mut socket, _) = listener.accept().await.unwrap();
        let _ = read_request_head(&mut socket).await;
        // Hold the connection open briefly before answering, so the
        // second request is genuinely forced to wait on capacity.
        tokio::time::sleep(Duration::from_millis(100)).await;
        socket.write_all(OK_RESPONSE.as_bytes()).await.unwrap();
    });
    let server_b = tokio::spawn(async move {
        let listener = TcpListener::bind(addr_b).await.unwrap();
        let (mut socket, _) = listener.accept().await.unwrap();
        let _ = read_request_head(&mut socket).await;
        socket.write_all(OK_RESPONSE.as_bytes()).await.unwrap();
    });

    let pool_config = PoolConfig { max_connections: 1, ..PoolConfig::default() };
    let pool = Arc::new(Pool::new(PoolOptions { pool_config, ..PoolOptions::default() }).unwrap());

    let mut request_a = Request::new("GET", Url::parse(&format!("http://{addr_a}/")).unwrap(), Headers::new(), bytes::Bytes::new());
    request_a.extensions.timeout = TimeoutConfig { pool: Some(Duration::from_secs(2)), ..TimeoutConfig::default() };
    let mut request_b = Request::new("GET", Url::parse(&format!("http://{addr_b}/")).unwrap(), Headers::new(), bytes::Bytes::new());
    request_b.extensions.timeout = TimeoutConfig { pool: Some(Duration::from_secs(2)), ..TimeoutConfig::default() };

    let handle_a = tokio::spawn({
        let pool = Arc::clone(&pool);
        async move { pool.handle_request(request_a).await }
    });
    // Give request A a head start so it claims the one connection slot.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let mut response_b = pool.handle_request(request_b).await.unwrap();
    while response_b.body.next_chunk().await.unwrap().is_some() {}
    response_b.body.close().await.unwrap();

    let response_a = handle_a.await.unwrap().unwrap();
    drop(response_a);

    server_a.await.unwrap();
    server_b.await.unwrap();
}
