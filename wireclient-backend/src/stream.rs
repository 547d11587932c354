//! The byte-stream seam between the sans-I/O protocol engines and whatever
//! async runtime actually owns the socket. Protocol engines never see a
//! `TcpStream` or an `AsyncRead`/`AsyncWrite` impl directly — only this.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use wireclient_common::Result;

/// Keys accepted by [`NetworkStream::extra_info`]. Matches the network
/// backend interface's `extra_info(key)` accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtraInfoKey {
    /// Negotiated ALPN protocol, TLS version, peer certificate summary.
    SslObject,
    ClientAddr,
    ServerAddr,
    /// Whether the socket currently has bytes (or EOF) pending without
    /// blocking — used to detect a peer that closed an idle connection.
    IsReadable,
}

/// Values returned by [`NetworkStream::extra_info`].
#[derive(Debug, Clone)]
pub enum ExtraInfoValue {
    Addr(SocketAddr),
    Bool(bool),
    Text(String),
}

impl fmt::Display for ExtraInfoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtraInfoValue::Addr(a) => write!(f, "{a}"),
            ExtraInfoValue::Bool(b) => write!(f, "{b}"),
            ExtraInfoValue::Text(t) => write!(f, "{t}"),
        }
    }
}

/// A single, already-established byte stream: plain TCP, TLS-wrapped TCP,
/// a Unix-domain socket, or (after a CONNECT tunnel) a stream layered on
/// top of another `NetworkStream`.
#[async_trait]
pub trait NetworkStream: Send + Sync {
    /// Read up to `max_bytes`. An empty return means EOF.
    async fn read(&mut self, max_bytes: usize, timeout: Option<Duration>) -> Result<Bytes>;

    async fn write(&mut self, buf: &[u8], timeout: Option<Duration>) -> Result<()>;

    async fn close(&mut self) -> Result<()>;

    /// Upgrade this stream to TLS in place, consuming it. Used both for
    /// `https://` connects and for a CONNECT-tunnel's TLS layer.
    async fn start_tls(
        self: Box<Self>,
        ctx: Arc<rustls::ClientConfig>,
        server_hostname: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn NetworkStream>>;

    fn extra_info(&self, key: ExtraInfoKey) -> Option<ExtraInfoValue>;
}
