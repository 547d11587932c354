//! `CONNECT`-tunnel proxy adapter: dials the proxy, issues a `CONNECT
//! host:port` handshake, and hands the resulting plaintext stream to a
//! [`wireclient_connection::Connection`] as its [`TunnelDialer`] — the
//! connection's own TLS/ALPN negotiation takes over from there exactly
//! as it would for a direct connect.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use wireclient_backend::{NetworkBackend, NetworkStream, SocketOptions};
use wireclient_common::{Error, Result, TimeoutConfig};
use wireclient_connection::TunnelDialer;
use wireclient_http1::{Event, Http11Connection, NextEvent, READ_CHUNK_HINT};
use wireclient_types::{Headers, Origin, Request, Url};

/// Dials a `CONNECT`-capable proxy and hands back a tunnel to `target`.
pub struct HttpConnectDialer {
    proxy_origin: Origin,
    target: Origin,
    proxy_headers: Headers,
    backend: Arc<dyn NetworkBackend>,
    proxy_ssl_context: Option<Arc<rustls::ClientConfig>>,
}

impl HttpConnectDialer {
    #[must_use]
    pub fn new(
        proxy_origin: Origin,
        target: Origin,
        proxy_headers: Headers,
        backend: Arc<dyn NetworkBackend>,
        proxy_ssl_context: Option<Arc<rustls::ClientConfig>>,
    ) -> Self {
        Self { proxy_origin, target, proxy_headers, backend, proxy_ssl_context }
    }
}

#[async_trait]
impl TunnelDialer for HttpConnectDialer {
    async fn dial(&self, timeouts: TimeoutConfig) -> Result<Box<dyn NetworkStream>> {
        let proxy_host = String::from_utf8_lossy(&self.proxy_origin.host).into_owned();
        tracing::debug!(proxy = %self.proxy_origin, target = %self.target, "connecting to CONNECT proxy");

        let mut stream = self
            .backend
            .connect_tcp(&proxy_host, self.proxy_origin.port, timeouts.connect, None, SocketOptions::default())
            .await?;

        if self.proxy_origin.is_tls() {
            let ctx = self
                .proxy_ssl_context
                .clone()
                .ok_or_else(|| Error::LocalProtocolError("tls proxy configured without an ssl context".into()))?;
            stream = stream.start_tls(ctx, Some(&proxy_host), timeouts.connect).await?;
        }

        let authority = format!(
            "{}:{}",
            String::from_utf8_lossy(&self.target.host),
            self.target.port
        );
        let url = Url::from_parts(Bytes::from_static(b"http"), self.target.host.clone(), Some(self.target.port), Bytes::from(authority));
        let request = Request::new("CONNECT", url, self.proxy_headers.clone(), Bytes::new());

        let mut engine = Http11Connection::new();
        let head_bytes = engine.send_request_headers(&request)?;
        stream.write(&head_bytes, timeouts.write).await?;

        let head = loop {
            match engine.next_event()? {
                NextEvent::Event(Event::Response(head)) => break head,
                NextEvent::Event(Event::InformationalResponse(_)) => continue,
                NextEvent::NeedData(_) => {
                    let data = stream.read(READ_CHUNK_HINT, timeouts.read).await?;
                    if data.is_empty() {
                        return Err(Error::ServerDisconnectedError);
                    }
                    engine.receive_data(&data);
                }
                NextEvent::Event(Event::Data(_) | Event::EndOfMessage | Event::ConnectionClosed) | NextEvent::Paused(_) => {
                    return Err(Error::RemoteProtocolError("unexpected event during CONNECT handshake".into()));
                }
            }
        };

        if !(200..300).contains(&head.status_code) {
            return Err(Error::ProxyError(format!(
                "CONNECT rejected with status {}",
                head.status_code
            )));
        }

        // Any bytes the proxy pipelined immediately after its response
        // head are held in `engine`'s internal buffer, which has no
        // accessor to recover them — an eager proxy that writes tunnel
        // data in the same flight as the CONNECT response would lose
        // those bytes. Real-world CONNECT responses don't pipeline, so
        // this is accepted rather than threading a leftover-bytes buffer
        // through `NetworkStream`.
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authority_target_has_no_leading_slash() {
        let url = Url::from_parts(Bytes::from_static(b"http"), Bytes::from_static(b"origin.example"), Some(443), Bytes::from_static(b"origin.example:443"));
        assert_eq!(url.target.as_ref(), b"origin.example:443");
    }
}
