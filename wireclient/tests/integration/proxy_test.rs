use super::{get_free_port, local_addr, read_request_head, spawn_scripted_server};
use wireclient_pool::{HttpProxy, ProxyPoolOptions};
use wireclient_types::{Headers, Request, Url};

const OK_RESPONSE: &str = "HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok";

#[tokio::test]
async fn forwarding_proxy_rewrites_target_to_absolute_uri() {
    let proxy_port = get_free_port();
    let proxy_addr = local_addr(proxy_port).await;

    let server = tokio::spawn({
        let proxy_addr = proxy_addr;
        async move {
            let listener = tokio::net::TcpListener::bind(proxy_addr).await.unwrap();
            let (mut socket, _) = listener.accept().await.unwrap();
            let head = read_request_head(&mut socket).await;
            tokio::io::AsyncWriteExt::write_all(&mut socket, OK_RESPONSE.as_bytes()).await.unwrap();
            head
        }
    });

    let proxy = HttpProxy::new(
        &format!("http://{proxy_addr}/"),
        None,
        Headers::new(),
        None,
        ProxyPoolOptions::default(),
    )
    .unwrap();

    let request = Request::new(
        "GET",
        Url::parse("http://origin.example/widgets").unwrap(),
        Headers::new(),
        bytes::Bytes::new(),
    );
    let mut response = proxy.pool().handle_request(request).await.unwrap();
    assert_eq!(response.status, 200);
    while response.body.next_chunk().await.unwrap().is_some() {}
    response.body.close().await.unwrap();

    let head = server.await.unwrap();
    assert!(head.starts_with("GET http://origin.example/widgets HTTP/1.1"), "got: {head}");
}

#[tokio::test]
async fn connect_tunnel_failure_surfaces_as_an_error() {
    let proxy_port = get_free_port();
    let proxy_addr = local_addr(proxy_port).await;

    let _server = tokio::spawn({
        let proxy_addr = proxy_addr;
        async move {
            let listener = tokio::net::TcpListener::bind(proxy_addr).await.unwrap();
            let (mut socket, _) = listener.accept().await.unwrap();
            let _ = read_request_head(&mut socket).await;
            let denied = "HTTP/1.1 407 Proxy Authentication Required\r\nContent-Length: 0\r\n\r\n";
            tokio::io::AsyncWriteExt::write_all(&mut socket, denied.as_bytes()).await.unwrap();
        }
    });

    let proxy = HttpProxy::new(
        &format!("http://{proxy_addr}/"),
        None,
        Headers::new(),
        None,
        ProxyPoolOptions::default(),
    )
    .unwrap();

    let request = Request::new(
        "GET",
        Url::parse("https://origin.example/secure").unwrap(),
        Headers::new(),
        bytes::Bytes::new(),
    );
    let result = proxy.pool().handle_request(request).await;
    assert!(result.is_err(), "a non-2xx CONNECT response must not produce a usable tunnel");
}
