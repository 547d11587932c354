//! The `Pool` facade: one `Connection` per distinct origin, governed by
//! `max_connections`/`max_keepalive_connections`, with no proxy in
//! between. `HttpProxy`/`SocksProxy` (see [`crate::proxy`]) wrap the same
//! [`Scheduler`] with a different [`ConnectionFactory`].

use crate::scheduler::{ConnectionFactory, PoolRequest, Scheduler};
use async_trait::async_trait;
use bytes::Bytes;
use std::net::IpAddr;
use std::sync::Arc;
use wireclient_backend::{NetworkBackend, SocketOptions, TokioBackend};
use wireclient_common::{Error, HandleRequestError, Http2Config, PoolConfig, Result};
use wireclient_connection::Connection;
use wireclient_sync::shielded;
use wireclient_types::{Body, ByteStream, Origin, Request, Response};

/// Remove `pool_request` and re-run assignment, closing whatever the
/// scheduler hands back. Always driven through [`shielded`] at its call
/// sites: once a request has been dequeued and handed a connection, this
/// bookkeeping must finish even if the task awaiting it is cancelled, or
/// the connection it was using is leaked as neither assigned nor idle.
async fn cleanup_after(scheduler: Arc<Scheduler>, pool_request: Arc<PoolRequest>) {
    scheduler.remove_request(&pool_request);
    for conn in scheduler.run_assignment() {
        conn.close().await;
    }
}

fn validate_scheme(request: &Request) -> Result<()> {
    match &request.url.scheme[..] {
        b"http" | b"https" | b"ws" | b"wss" => Ok(()),
        other => Err(Error::UnsupportedProtocol(String::from_utf8_lossy(other).into_owned())),
    }
}

struct DirectFactory {
    backend: Arc<dyn NetworkBackend>,
    ssl_context: Arc<rustls::ClientConfig>,
    pool_config: PoolConfig,
    http2_config: Http2Config,
    local_address: Option<IpAddr>,
    socket_options: SocketOptions,
}

impl ConnectionFactory for DirectFactory {
    fn create(&self, origin: &Origin) -> Arc<dyn wireclient_connection::PoolConnection> {
        Connection::with_socket_options(
            origin.clone(),
            Arc::clone(&self.backend),
            Arc::clone(&self.ssl_context),
            self.pool_config.clone(),
            self.http2_config,
            self.local_address,
            self.socket_options,
        )
    }
}

/// Constructor parameters for [`Pool`], mirroring the exposed `Pool(...)`
/// surface. `Default` matches the documented defaults
/// (`max_connections=10`, `http1=true`, `http2=false`, `retries=0`).
pub struct PoolOptions {
    pub ssl_context: Option<Arc<rustls::ClientConfig>>,
    pub pool_config: PoolConfig,
    pub http2_config: Http2Config,
    pub local_address: Option<IpAddr>,
    pub socket_options: SocketOptions,
    pub network_backend: Option<Arc<dyn NetworkBackend>>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            ssl_context: None,
            pool_config: PoolConfig::default(),
            http2_config: Http2Config::default(),
            local_address: None,
            socket_options: SocketOptions::default(),
            network_backend: None,
        }
    }
}

/// A pooled, origin-keyed set of connections behind one `handle_request`
/// entry point. See the crate-level scheduler for the cleanup/matching
/// algorithm this drives on every request.
pub struct Pool {
    scheduler: Arc<Scheduler>,
}

impl Pool {
    pub fn new(options: PoolOptions) -> Result<Self> {
        let ssl_context = match options.ssl_context {
            Some(ctx) => ctx,
            None => wireclient_backend::tls::default_client_config().map_err(|e| Error::ConnectError(e.to_string()))?,
        };
        let backend = options.network_backend.unwrap_or_else(|| Arc::new(TokioBackend));
        let pool_config = options.pool_config;
        let max_connections = pool_config.max_connections;
        let max_keepalive = pool_config.effective_max_keepalive();
        let factory = Arc::new(DirectFactory {
            backend,
            ssl_context,
            pool_config,
            http2_config: options.http2_config,
            local_address: options.local_address,
            socket_options: options.socket_options,
        });
        Ok(Self { scheduler: Arc::new(Scheduler::new(factory, max_connections, max_keepalive)) })
    }

    /// Build a pool around a caller-supplied [`ConnectionFactory`] — used
    /// by the proxy facades, which route every origin through a proxy
    /// instead of dialing it directly.
    pub(crate) fn with_factory(factory: Arc<dyn ConnectionFactory>, max_connections: usize, max_keepalive_connections: usize) -> Self {
        Self { scheduler: Arc::new(Scheduler::new(factory, max_connections, max_keepalive_connections)) }
    }

    /// The request lifecycle from the pool scheduler's contract: validate
    /// the scheme, queue a `PoolRequest`, loop assignment/wait/dispatch
    /// until a connection actually serves the request or a fatal error
    /// surfaces, then hand back a response whose body close re-runs
    /// assignment.
    pub async fn handle_request(&self, mut request: Request) -> Result<Response> {
        validate_scheme(&request)?;

        let origin = request.url.origin();
        let timeouts = request.extensions.timeout;
        let pool_request = self.scheduler.enqueue(origin);

        loop {
            let to_close = self.scheduler.run_assignment();
            self.close_all(to_close).await;

            if pool_request.wait(timeouts.pool).await.is_err() {
                shielded(cleanup_after(Arc::clone(&self.scheduler), Arc::clone(&pool_request))).await;
                return Err(Error::PoolTimeout);
            }

            let connection = pool_request
                .assignment()
                .expect("connection_acquired only fires once an assignment is set");

            match connection.handle_request(&mut request, timeouts).await {
                Ok(response) => {
                    return Ok(self.wrap_response(response, pool_request));
                }
                Err(HandleRequestError::Retry) => {
                    pool_request.clear_assignment();
                    continue;
                }
                Err(HandleRequestError::Fatal(err)) => {
                    shielded(cleanup_after(Arc::clone(&self.scheduler), Arc::clone(&pool_request))).await;
                    return Err(err);
                }
            }
        }
    }

    fn wrap_response(&self, response: Response, pool_request: Arc<PoolRequest>) -> Response {
        let Response { status, headers, body, extensions } = response;
        let wrapped: Body = Box::new(ReleaseOnClose {
            inner: body,
            scheduler: Arc::clone(&self.scheduler),
            pool_request: Some(pool_request),
        });
        Response::new(status, headers, wrapped, extensions)
    }

    async fn close_all(&self, connections: Vec<Arc<dyn wireclient_connection::PoolConnection>>) {
        for conn in connections {
            conn.close().await;
        }
    }

    /// Close every connection currently held by the pool. In-flight
    /// responses observe their next body read fail, per the close-while-
    /// in-flight failure rule — this crate has no async `Drop`, so
    /// teardown is always this explicit call rather than a scope guard.
    pub async fn close(&self) {
        self.scheduler.close_all().await;
    }

    /// Snapshot of each held connection's human-readable status.
    #[must_use]
    pub fn connections(&self) -> Vec<String> {
        self.scheduler.connections().iter().map(|c| c.info()).collect()
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.scheduler.connections().len()
    }

    #[must_use]
    pub fn idle_connection_count(&self) -> usize {
        self.scheduler.connections().iter().filter(|c| c.is_idle()).count()
    }
}

/// Wraps a response body so that closing it removes the now-served
/// `PoolRequest` and re-runs assignment — the connection it was using may
/// have just become available again for another queued request.
struct ReleaseOnClose {
    inner: Body,
    scheduler: Arc<Scheduler>,
    pool_request: Option<Arc<PoolRequest>>,
}

#[async_trait]
impl ByteStream for ReleaseOnClose {
    async fn next_chunk(&mut self) -> std::result::Result<Option<Bytes>, Error> {
        self.inner.next_chunk().await
    }

    async fn close(&mut self) -> std::result::Result<(), Error> {
        let result = self.inner.close().await;
        if let Some(pool_request) = self.pool_request.take() {
            shielded(cleanup_after(Arc::clone(&self.scheduler), pool_request)).await;
        }
        result
    }

    fn is_restartable(&self) -> bool {
        self.inner.is_restartable()
    }

    fn restart(&mut self) -> std::result::Result<(), Error> {
        self.inner.restart()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wireclient_types::Url;

    fn request(url: &str) -> Request {
        Request::new("GET", Url::parse(url).unwrap(), wireclient_types::Headers::new(), Bytes::new())
    }

    #[test]
    fn scheme_validation_accepts_the_four_supported_schemes() {
        for scheme in ["http", "https", "ws", "wss"] {
            let url = format!("{scheme}://example.com/");
            assert!(validate_scheme(&request(&url)).is_ok());
        }
    }

    #[test]
    fn scheme_validation_rejects_anything_else() {
        let req = request("ftp://example.com/");
        assert!(matches!(validate_scheme(&req), Err(Error::UnsupportedProtocol(_))));
    }
}
