use super::{get_free_port, local_addr, spawn_scripted_server};
use std::time::Duration;
use wireclient_pool::{Pool, PoolOptions};
use wireclient_types::{Headers, Request, Url};

const KEEP_ALIVE_RESPONSE: &str = "HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok";
const CLOSE_RESPONSE: &str = "HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 2\r\n\r\nok";

async fn drain_and_close(mut response: wireclient_types::Response) -> (u16, Vec<u8>) {
    let status = response.status;
    let mut body = Vec::new();
    while let Some(chunk) = response.body.next_chunk().await.unwrap() {
        body.extend_from_slice(&chunk);
    }
    response.body.close().await.unwrap();
    (status, body)
}

fn get_request(addr: std::net::SocketAddr) -> Request {
    Request::new("GET", Url::parse(&format!("http://{addr}/")).unwrap(), Headers::new(), bytes::Bytes::new())
}

#[tokio::test]
async fn two_requests_to_the_same_origin_reuse_one_connection() {
    let port = get_free_port();
    let addr = local_addr(port).await;
    let _server = spawn_scripted_server(port, vec![KEEP_ALIVE_RESPONSE, KEEP_ALIVE_RESPONSE]);

    let pool = Pool::new(PoolOptions::default()).unwrap();

    let (status, body) = drain_and_close(pool.handle_request(get_request(addr)).await.unwrap()).await;
    assert_eq!(status, 200);
    assert_eq!(body, b"ok");

    let (status, body) = drain_and_close(pool.handle_request(get_request(addr)).await.unwrap()).await;
    assert_eq!(status, 200);
    assert_eq!(body, b"ok");

    assert_eq!(pool.connection_count(), 1);
    assert_eq!(pool.idle_connection_count(), 1);
}

#[tokio::test]
async fn connection_close_response_is_not_reused() {
    let port = get_free_port();
    let addr = local_addr(port).await;
    let _server = spawn_scripted_server(port, vec![CLOSE_RESPONSE]);

    let pool = Pool::new(PoolOptions::default()).unwrap();
    let (status, body) = drain_and_close(pool.handle_request(get_request(addr)).await.unwrap()).await;
    assert_eq!(status, 200);
    assert_eq!(body, b"ok");

    // The engine marks the connection CLOSED on seeing the header; give
    // the scheduler's next assignment pass a moment to sweep it.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(pool.connection_count(), 0);
}
