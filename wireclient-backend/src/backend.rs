//! The network backend trait: the one seam the protocol engines and pool
//! never cross directly. Swapping this out (for a test double, or a
//! cooperative-single-threaded executor) never touches engine code.

use crate::io_stream::{Inner, IoStream};
use crate::socket_tuning::{self, SocketOptions};
use crate::stream::NetworkStream;
use async_trait::async_trait;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tokio::net::{TcpSocket, TcpStream, UnixStream};
use wireclient_common::{Error, Result};

#[async_trait]
pub trait NetworkBackend: Send + Sync {
    async fn connect_tcp(
        &self,
        host: &str,
        port: u16,
        timeout: Option<Duration>,
        local_address: Option<IpAddr>,
        socket_options: SocketOptions,
    ) -> Result<Box<dyn NetworkStream>>;

    async fn connect_unix(
        &self,
        path: &Path,
        timeout: Option<Duration>,
        socket_options: SocketOptions,
    ) -> Result<Box<dyn NetworkStream>>;

    async fn sleep(&self, duration: Duration);
}

/// The production backend: real sockets via Tokio.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioBackend;

async fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }
    tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "DNS resolution returned no addresses"))
}

fn bind_socket(addr: SocketAddr, local_address: Option<IpAddr>) -> io::Result<TcpSocket> {
    let socket = if addr.is_ipv4() { TcpSocket::new_v4() } else { TcpSocket::new_v6() }?;
    if let Some(local) = local_address {
        socket.bind(SocketAddr::new(local, 0))?;
    }
    Ok(socket)
}

#[async_trait]
impl NetworkBackend for TokioBackend {
    async fn connect_tcp(
        &self,
        host: &str,
        port: u16,
        timeout: Option<Duration>,
        local_address: Option<IpAddr>,
        socket_options: SocketOptions,
    ) -> Result<Box<dyn NetworkStream>> {
        let addr = resolve(host, port)
            .await
            .map_err(|e| Error::ConnectError(e.to_string()))?;

        let connect = async {
            let socket = bind_socket(addr, local_address)?;
            socket.connect(addr).await
        };

        let tcp: TcpStream = match timeout {
            Some(d) => tokio::time::timeout(d, connect)
                .await
                .map_err(|_| Error::ConnectTimeout)?
                .map_err(|e| Error::ConnectError(e.to_string()))?,
            None => connect.await.map_err(|e| Error::ConnectError(e.to_string()))?,
        };

        socket_tuning::configure_silent(&tcp, &socket_options);
        let peer_addr = tcp.peer_addr().ok();
        let local_addr = tcp.local_addr().ok();

        Ok(Box::new(IoStream {
            inner: Inner::Tcp(tcp),
            peer_addr,
            local_addr,
            alpn: None,
        }))
    }

    async fn connect_unix(
        &self,
        path: &Path,
        timeout: Option<Duration>,
        _socket_options: SocketOptions,
    ) -> Result<Box<dyn NetworkStream>> {
        let connect = UnixStream::connect(path);
        let stream = match timeout {
            Some(d) => tokio::time::timeout(d, connect)
                .await
                .map_err(|_| Error::ConnectTimeout)?
                .map_err(|e| Error::ConnectError(e.to_string()))?,
            None => connect.await.map_err(|e| Error::ConnectError(e.to_string()))?,
        };

        Ok(Box::new(IoStream {
            inner: Inner::Unix(stream),
            peer_addr: None,
            local_addr: None,
            alpn: None,
        }))
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connect_tcp_reaches_a_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move { listener.accept().await.unwrap() });

        let backend = TokioBackend;
        let stream = backend
            .connect_tcp(&addr.ip().to_string(), addr.port(), None, None, SocketOptions::default())
            .await
            .unwrap();
        accept.await.unwrap();
        assert!(stream.extra_info(crate::ExtraInfoKey::ServerAddr).is_some());
    }

    #[tokio::test]
    async fn connect_tcp_times_out_against_an_unroutable_address() {
        let backend = TokioBackend;
        let result = backend
            .connect_tcp("10.255.255.1", 81, Some(Duration::from_millis(20)), None, SocketOptions::default())
            .await;
        assert!(matches!(result, Err(Error::ConnectTimeout)));
    }
}
