//! The top-level per-origin connection façade: lazy-connects on first
//! use, negotiates HTTP/1.1 vs HTTP/2 over ALPN, and retries the connect
//! phase on transient network failure with a deterministic backoff
//! schedule. Everything downstream of "socket is open" is delegated to
//! [`Http1Session`]/[`Http2Session`].

use crate::http1::Http1Session;
use crate::http2::Http2Session;
use crate::meta::ConnMeta;
use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use wireclient_backend::{ExtraInfoKey, ExtraInfoValue, NetworkBackend, NetworkStream, SocketOptions};
use wireclient_common::constants::ALPN_PROTOCOLS;
use wireclient_common::{HandleRequestError, Http2Config, PoolConfig, Result, TimeoutConfig};
use wireclient_types::{Origin, Request, Response};

enum Engine {
    Http1(Http1Session),
    Http2(Arc<Http2Session>),
}

/// How a [`Connection`] gets from "nothing" to a connected, plaintext
/// stream to `origin`'s host before TLS/ALPN negotiation takes over.
/// The default is a direct TCP connect; the forwarding/tunneling/SOCKS5
/// proxy adapters supply one of these instead of reaching into
/// `Connection`'s internals.
#[async_trait]
pub trait TunnelDialer: Send + Sync {
    async fn dial(&self, timeouts: TimeoutConfig) -> Result<Box<dyn NetworkStream>>;
}

/// Deterministic connect-retry backoff: no jitter, doubling from the
/// second attempt on. `attempt` is zero-based.
fn retry_delay(attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(0.5 * 2f64.powi(attempt as i32 - 1))
}

/// One transport connection to one origin, plus the protocol engine
/// multiplexed over it. Connects lazily: constructing a `Connection`
/// does no I/O.
pub struct Connection {
    origin: Origin,
    backend: Arc<dyn NetworkBackend>,
    ssl_context: Arc<rustls::ClientConfig>,
    pool_config: PoolConfig,
    http2_config: Http2Config,
    local_address: Option<IpAddr>,
    socket_options: SocketOptions,
    tunnel: Option<Arc<dyn TunnelDialer>>,
    meta: Arc<ConnMeta>,
    engine: OnceCell<Engine>,
}

impl Connection {
    #[must_use]
    pub fn new(
        origin: Origin,
        backend: Arc<dyn NetworkBackend>,
        ssl_context: Arc<rustls::ClientConfig>,
        pool_config: PoolConfig,
        http2_config: Http2Config,
    ) -> Arc<Self> {
        Self::with_socket_options(origin, backend, ssl_context, pool_config, http2_config, None, SocketOptions::default())
    }

    /// Like [`Self::new`], binding the outbound socket to `local_address`
    /// and applying `socket_options` — the knobs `Pool`'s constructor
    /// exposes per-connection.
    #[must_use]
    pub fn with_socket_options(
        origin: Origin,
        backend: Arc<dyn NetworkBackend>,
        ssl_context: Arc<rustls::ClientConfig>,
        pool_config: PoolConfig,
        http2_config: Http2Config,
        local_address: Option<IpAddr>,
        socket_options: SocketOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            origin,
            backend,
            ssl_context,
            pool_config,
            http2_config,
            local_address,
            socket_options,
            tunnel: None,
            meta: Arc::new(ConnMeta::new()),
            engine: OnceCell::new(),
        })
    }

    /// Build a connection that reaches `origin` through a proxy instead
    /// of dialing it directly. Everything past "plaintext stream
    /// connected" — TLS, ALPN, HTTP/1.1-vs-HTTP/2 — is unchanged.
    #[must_use]
    pub fn with_tunnel(
        origin: Origin,
        tunnel: Arc<dyn TunnelDialer>,
        ssl_context: Arc<rustls::ClientConfig>,
        pool_config: PoolConfig,
        http2_config: Http2Config,
    ) -> Arc<Self> {
        Arc::new(Self {
            origin,
            backend: Arc::new(wireclient_backend::TokioBackend),
            ssl_context,
            pool_config,
            http2_config,
            local_address: None,
            socket_options: SocketOptions::default(),
            tunnel: Some(tunnel),
            meta: Arc::new(ConnMeta::new()),
            engine: OnceCell::new(),
        })
    }

    #[must_use]
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    #[must_use]
    pub fn meta(&self) -> &Arc<ConnMeta> {
        &self.meta
    }

    #[must_use]
    pub fn request_count(&self) -> u64 {
        self.meta.request_count()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.meta.is_idle()
    }

    #[must_use]
    pub fn has_expired(&self) -> bool {
        self.meta.has_expired()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.meta.is_closed()
    }

    /// Whether the pool scheduler may hand this connection a new
    /// request right now. An unconnected connection is always a
    /// candidate — the scheduler doesn't know which protocol it'll end
    /// up speaking until the first connect completes.
    #[must_use]
    pub fn is_available(&self) -> bool {
        match self.engine.get() {
            None => !self.meta.is_closed(),
            Some(Engine::Http1(_)) => self.meta.is_available_http1(),
            Some(Engine::Http2(_)) => self.meta.is_available_http2(),
        }
    }

    async fn dial(&self, timeouts: TimeoutConfig) -> Result<Box<dyn NetworkStream>> {
        let host = String::from_utf8_lossy(&self.origin.host).into_owned();
        let port = self.origin.port;

        let stream = match &self.tunnel {
            Some(tunnel) => {
                tracing::debug!(%host, port, "connecting through proxy tunnel");
                tunnel.dial(timeouts).await?
            }
            None => {
                tracing::debug!(%host, port, "connecting");
                self.backend
                    .connect_tcp(&host, port, timeouts.connect, self.local_address, self.socket_options)
                    .await?
            }
        };

        if !self.origin.is_tls() {
            return Ok(stream);
        }

        let mut protocols: Vec<&str> = Vec::new();
        if self.pool_config.http1 {
            protocols.push("http/1.1");
        }
        if self.pool_config.http2 {
            protocols.push("h2");
        }
        if protocols.is_empty() {
            protocols = ALPN_PROTOCOLS.to_vec();
        }
        let tls_config = wireclient_backend::tls::with_alpn(&self.ssl_context, &protocols);
        stream.start_tls(tls_config, Some(&host), timeouts.connect).await
    }

    async fn connect_once(&self, timeouts: TimeoutConfig) -> Result<&Engine> {
        self.engine
            .get_or_try_init(|| async {
                let stream = self.dial(timeouts).await?;
                let alpn = match stream.extra_info(ExtraInfoKey::SslObject) {
                    Some(ExtraInfoValue::Text(protocol)) => Some(protocol),
                    _ => None,
                };
                let negotiated_h2 = self.pool_config.http2 && alpn.as_deref() == Some("h2");
                if negotiated_h2 {
                    tracing::debug!(origin = %self.origin, "negotiated HTTP/2");
                    Ok(Engine::Http2(Http2Session::new(
                        stream,
                        Arc::clone(&self.meta),
                        self.http2_config.max_concurrent_streams as usize,
                    )))
                } else {
                    tracing::debug!(origin = %self.origin, "using HTTP/1.1");
                    self.meta.mark_idle(self.pool_config.keepalive_expiry);
                    Ok(Engine::Http1(Http1Session::new(stream)))
                }
            })
            .await
    }

    /// Drive one request to completion, retrying the *connect* phase
    /// (never a request already in flight) on connect-class errors with
    /// a deterministic backoff. `ConnectionNotAvailable`-class failures
    /// surface as `HandleRequestError::Retry` for the pool to reassign —
    /// this connection never retries those itself.
    pub async fn handle_request(
        &self,
        request: &mut Request,
        timeouts: TimeoutConfig,
    ) -> std::result::Result<Response, HandleRequestError> {
        let mut attempt = 0;
        let engine = loop {
            match self.connect_once(timeouts).await {
                Ok(engine) => break engine,
                Err(err) if err.is_connect_class() && attempt < self.pool_config.retries => {
                    let delay = retry_delay(attempt);
                    attempt += 1;
                    tracing::debug!(origin = %self.origin, attempt, delay_secs = delay.as_secs_f64(), "retrying connect");
                    if delay > Duration::ZERO {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(err) => return Err(err.into()),
            }
        };

        match engine {
            Engine::Http1(session) => {
                session.handle_request(&self.meta, self.pool_config.keepalive_expiry, request, timeouts).await
            }
            Engine::Http2(session) => session.handle_request(request, timeouts).await,
        }
    }

    /// Human-readable status line for the pool's `connections()` snapshot
    /// and tracing span fields — not meant for parsing.
    #[must_use]
    pub fn info(&self) -> String {
        let protocol = match self.engine.get() {
            None => "pending",
            Some(Engine::Http1(_)) => "http/1.1",
            Some(Engine::Http2(_)) => "h2",
        };
        format!(
            "{} protocol={} status={:?} requests={}",
            self.origin,
            protocol,
            self.meta.status(),
            self.meta.request_count()
        )
    }

    /// Forcibly close the underlying transport, used by the pool when
    /// evicting an expired or GOAWAY'd connection.
    pub async fn close(&self) {
        self.meta.mark_closed();
        // Nothing currently holds a live socket reference once `engine`
        // is populated other than the sessions themselves, and they
        // close their stream as part of each response body's lifecycle;
        // marking CLOSED here is enough to stop the scheduler from
        // handing this connection any more work.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delays_follow_the_documented_schedule() {
        assert_eq!(retry_delay(0), Duration::ZERO);
        assert_eq!(retry_delay(1), Duration::from_millis(500));
        assert_eq!(retry_delay(2), Duration::from_secs(1));
        assert_eq!(retry_delay(3), Duration::from_secs(2));
        assert_eq!(retry_delay(4), Duration::from_secs(4));
    }
}
