//! `HttpProxy` and `SocksProxy`: the same [`crate::pool::Pool`] machinery
//! as a direct pool, but every connection the scheduler creates routes
//! through a proxy instead of dialing the target directly.

use crate::pool::Pool;
use crate::scheduler::ConnectionFactory;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::sync::Arc;
use wireclient_backend::{NetworkBackend, TokioBackend};
use wireclient_common::{Error, Http2Config, PoolConfig, Result};
use wireclient_connection::{Connection, PoolConnection};
use wireclient_proxy::{ForwardingProxy, HttpConnectDialer, Socks5Dialer};
use wireclient_types::{Headers, Origin, Url, UrlParseError};

/// Shared constructor knobs for [`HttpProxy`]/[`SocksProxy`], mirroring
/// `Pool`'s own pool-sizing parameters.
pub struct ProxyPoolOptions {
    pub pool_config: PoolConfig,
    pub http2_config: Http2Config,
    pub network_backend: Option<Arc<dyn NetworkBackend>>,
}

impl Default for ProxyPoolOptions {
    fn default() -> Self {
        Self { pool_config: PoolConfig::default(), http2_config: Http2Config::default(), network_backend: None }
    }
}

fn parse_proxy_url(proxy_url: &str) -> std::result::Result<Origin, UrlParseError> {
    Ok(Url::parse(proxy_url)?.origin())
}

struct HttpProxyFactory {
    proxy_origin: Origin,
    proxy_headers: Headers,
    backend: Arc<dyn NetworkBackend>,
    ssl_context: Arc<rustls::ClientConfig>,
    pool_config: PoolConfig,
    http2_config: Http2Config,
}

impl ConnectionFactory for HttpProxyFactory {
    fn create(&self, origin: &Origin) -> Arc<dyn PoolConnection> {
        if ForwardingProxy::can_handle_request(origin) {
            Arc::new(ForwardingProxy::new(
                self.proxy_origin.clone(),
                self.proxy_headers.clone(),
                Arc::clone(&self.backend),
                Arc::clone(&self.ssl_context),
                self.pool_config.clone(),
                self.http2_config,
            ))
        } else {
            let dialer = Arc::new(HttpConnectDialer::new(
                self.proxy_origin.clone(),
                origin.clone(),
                self.proxy_headers.clone(),
                Arc::clone(&self.backend),
                Some(Arc::clone(&self.ssl_context)),
            ));
            Connection::with_tunnel(
                origin.clone(),
                dialer,
                Arc::clone(&self.ssl_context),
                self.pool_config.clone(),
                self.http2_config,
            )
        }
    }
}

/// An HTTP(S) forward proxy: plaintext targets are forwarded with an
/// absolute-URI request line, TLS targets get a `CONNECT` tunnel.
pub struct HttpProxy {
    pool: Pool,
}

impl HttpProxy {
    pub fn new(
        proxy_url: &str,
        proxy_auth: Option<(String, String)>,
        mut proxy_headers: Headers,
        ssl_context: Option<Arc<rustls::ClientConfig>>,
        options: ProxyPoolOptions,
    ) -> Result<Self> {
        let proxy_origin = parse_proxy_url(proxy_url).map_err(|e| Error::LocalProtocolError(e.to_string()))?;
        if let Some((user, pass)) = proxy_auth {
            let credentials = STANDARD.encode(format!("{user}:{pass}"));
            proxy_headers.push_if_absent("Proxy-Authorization", format!("Basic {credentials}"));
        }

        let ssl_context = match ssl_context {
            Some(ctx) => ctx,
            None => wireclient_backend::tls::default_client_config().map_err(|e| Error::ConnectError(e.to_string()))?,
        };
        let backend = options.network_backend.unwrap_or_else(|| Arc::new(TokioBackend));
        let max_connections = options.pool_config.max_connections;
        let max_keepalive = options.pool_config.effective_max_keepalive();

        let factory = Arc::new(HttpProxyFactory {
            proxy_origin,
            proxy_headers,
            backend,
            ssl_context,
            pool_config: options.pool_config,
            http2_config: options.http2_config,
        });
        Ok(Self { pool: Pool::with_factory(factory, max_connections, max_keepalive) })
    }

    #[must_use]
    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

struct SocksProxyFactory {
    proxy_origin: Origin,
    credentials: Option<(String, String)>,
    backend: Arc<dyn NetworkBackend>,
    ssl_context: Arc<rustls::ClientConfig>,
    pool_config: PoolConfig,
    http2_config: Http2Config,
}

impl ConnectionFactory for SocksProxyFactory {
    fn create(&self, origin: &Origin) -> Arc<dyn PoolConnection> {
        let dialer = Arc::new(Socks5Dialer::new(
            self.proxy_origin.clone(),
            origin.clone(),
            self.credentials.clone(),
            Arc::clone(&self.backend),
        ));
        Connection::with_tunnel(
            origin.clone(),
            dialer,
            Arc::clone(&self.ssl_context),
            self.pool_config.clone(),
            self.http2_config,
        )
    }
}

/// A SOCKS5 proxy: every target, plaintext or TLS, is reached through the
/// same RFC 1928 handshake before the ordinary connection façade takes
/// over.
pub struct SocksProxy {
    pool: Pool,
}

impl SocksProxy {
    pub fn new(
        proxy_url: &str,
        proxy_auth: Option<(String, String)>,
        ssl_context: Option<Arc<rustls::ClientConfig>>,
        options: ProxyPoolOptions,
    ) -> Result<Self> {
        let proxy_origin = parse_proxy_url(proxy_url).map_err(|e| Error::LocalProtocolError(e.to_string()))?;
        let ssl_context = match ssl_context {
            Some(ctx) => ctx,
            None => wireclient_backend::tls::default_client_config().map_err(|e| Error::ConnectError(e.to_string()))?,
        };
        let backend = options.network_backend.unwrap_or_else(|| Arc::new(TokioBackend));
        let max_connections = options.pool_config.max_connections;
        let max_keepalive = options.pool_config.effective_max_keepalive();

        let factory = Arc::new(SocksProxyFactory {
            proxy_origin,
            credentials: proxy_auth,
            backend,
            ssl_context,
            pool_config: options.pool_config,
            http2_config: options.http2_config,
        });
        Ok(Self { pool: Pool::with_factory(factory, max_connections, max_keepalive) })
    }

    #[must_use]
    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_credentials_match_known_vector() {
        assert_eq!(STANDARD.encode("Aladdin:open sesame"), "QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    }
}
