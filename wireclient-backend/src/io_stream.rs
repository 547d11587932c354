//! The one concrete [`NetworkStream`] implementation: a plain TCP socket,
//! a Unix-domain socket, or a TLS layer on top of one, all presenting the
//! same `read`/`write`/`close`/`start_tls`/`extra_info` surface.

use crate::stream::{ExtraInfoKey, ExtraInfoValue, NetworkStream};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::FutureExt;
use rustls_pki_types::ServerName;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, Interest, ReadBuf};
use tokio::net::{TcpStream, UnixStream};
use wireclient_common::{Error, Result};

pub(crate) enum Inner {
    Tcp(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
    Unix(UnixStream),
}

impl AsyncRead for Inner {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Inner::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            Inner::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
            Inner::Unix(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Inner {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Inner::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            Inner::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
            Inner::Unix(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Inner::Tcp(s) => Pin::new(s).poll_flush(cx),
            Inner::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
            Inner::Unix(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Inner::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            Inner::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
            Inner::Unix(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// A connected byte stream, optionally TLS-wrapped.
pub struct IoStream {
    pub(crate) inner: Inner,
    pub(crate) peer_addr: Option<SocketAddr>,
    pub(crate) local_addr: Option<SocketAddr>,
    pub(crate) alpn: Option<Vec<u8>>,
}

async fn with_timeout<F, T>(fut: F, timeout: Option<Duration>, on_timeout: Error) -> Result<T>
where
    F: std::future::Future<Output = io::Result<T>>,
{
    let result = match timeout {
        Some(d) => tokio::time::timeout(d, fut).await.map_err(|_| on_timeout)?,
        None => fut.await,
    };
    result.map_err(Into::into)
}

fn is_readable_now(tcp: &TcpStream) -> Option<bool> {
    tcp.ready(Interest::READABLE)
        .now_or_never()
        .map(|ready| ready.map(|r| r.is_readable()).unwrap_or(true))
}

#[async_trait]
impl NetworkStream for IoStream {
    async fn read(&mut self, max_bytes: usize, timeout: Option<Duration>) -> Result<Bytes> {
        let mut buf = BytesMut::zeroed(max_bytes);
        let n = with_timeout(self.inner.read(&mut buf), timeout, Error::ReadTimeout).await?;
        buf.truncate(n);
        Ok(buf.freeze())
    }

    async fn write(&mut self, data: &[u8], timeout: Option<Duration>) -> Result<()> {
        with_timeout(
            async {
                self.inner.write_all(data).await?;
                self.inner.flush().await
            },
            timeout,
            Error::WriteTimeout,
        )
        .await
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.shutdown().await.map_err(Into::into)
    }

    async fn start_tls(
        self: Box<Self>,
        ctx: Arc<rustls::ClientConfig>,
        server_hostname: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn NetworkStream>> {
        let tcp = match self.inner {
            Inner::Tcp(tcp) => tcp,
            Inner::Tls(_) => {
                return Err(Error::LocalProtocolError(
                    "stream is already TLS-wrapped".into(),
                ))
            }
            Inner::Unix(_) => {
                return Err(Error::LocalProtocolError(
                    "cannot start TLS on a Unix-domain stream".into(),
                ))
            }
        };

        let host = server_hostname
            .map(str::to_owned)
            .or_else(|| self.peer_addr.map(|a| a.ip().to_string()))
            .unwrap_or_else(|| "localhost".to_string());
        let name: ServerName<'static> = ServerName::try_from(host)
            .map_err(|e| Error::LocalProtocolError(format!("invalid TLS server name: {e}")))?;

        let connector = tokio_rustls::TlsConnector::from(ctx);
        let connect = connector.connect(name, tcp);
        let tls_stream = with_timeout(connect, timeout, Error::ConnectTimeout).await?;

        let alpn = tls_stream
            .get_ref()
            .1
            .alpn_protocol()
            .map(<[u8]>::to_vec);

        Ok(Box::new(IoStream {
            inner: Inner::Tls(Box::new(tls_stream)),
            peer_addr: self.peer_addr,
            local_addr: self.local_addr,
            alpn,
        }))
    }

    fn extra_info(&self, key: ExtraInfoKey) -> Option<ExtraInfoValue> {
        match key {
            ExtraInfoKey::ClientAddr => self.local_addr.map(ExtraInfoValue::Addr),
            ExtraInfoKey::ServerAddr => self.peer_addr.map(ExtraInfoValue::Addr),
            ExtraInfoKey::SslObject => self
                .alpn
                .as_ref()
                .map(|p| ExtraInfoValue::Text(String::from_utf8_lossy(p).into_owned())),
            ExtraInfoKey::IsReadable => match &self.inner {
                Inner::Tcp(s) => is_readable_now(s).map(ExtraInfoValue::Bool),
                Inner::Tls(s) => is_readable_now(s.get_ref().0).map(ExtraInfoValue::Bool),
                Inner::Unix(_) => None,
            },
        }
    }
}
