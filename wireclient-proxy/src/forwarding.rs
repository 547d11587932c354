//! Plain-HTTP forwarding proxy: every request is sent to the proxy's own
//! origin with its target rewritten to the absolute original URL, and
//! the proxy's configured headers merged in behind whatever the caller
//! already set.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use wireclient_backend::NetworkBackend;
use wireclient_common::{Http2Config, HandleRequestError, PoolConfig, TimeoutConfig};
use wireclient_connection::{Connection, ConnMeta, PoolConnection};
use wireclient_types::{Headers, Origin, Request, Response};

/// Routes plaintext `http://` requests through an HTTP/1.1 connection to
/// a forwarding proxy instead of dialing the target directly.
pub struct ForwardingProxy {
    connection: Arc<Connection>,
    proxy_headers: Headers,
}

impl ForwardingProxy {
    #[must_use]
    pub fn new(
        proxy_origin: Origin,
        proxy_headers: Headers,
        backend: Arc<dyn NetworkBackend>,
        ssl_context: Arc<rustls::ClientConfig>,
        pool_config: PoolConfig,
        http2_config: Http2Config,
    ) -> Self {
        let connection = Connection::new(proxy_origin, backend, ssl_context, pool_config, http2_config);
        Self { connection, proxy_headers }
    }

    /// Only plain `http` requests can be forwarded this way — `https`
    /// needs a tunnel, since the proxy can't see inside a TLS stream.
    #[must_use]
    pub fn can_handle_request(target: &Origin) -> bool {
        matches!(&target.scheme[..], b"http")
    }

    /// Rewrite `request` in place: absolute-URI target, proxy headers
    /// merged in (request headers always win on a name collision).
    pub fn prepare_request(&self, request: &mut Request) {
        request.extensions.target_override = Some(Bytes::from(request.url.to_string()));
        for (name, value) in self.proxy_headers.iter() {
            let name = String::from_utf8_lossy(name).into_owned();
            request.headers.push_if_absent(&name, value.clone());
        }
    }

    #[must_use]
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }
}

#[async_trait]
impl PoolConnection for ForwardingProxy {
    fn origin(&self) -> &Origin {
        self.connection.origin()
    }

    fn meta(&self) -> &Arc<ConnMeta> {
        self.connection.meta()
    }

    fn is_available(&self) -> bool {
        self.connection.is_available()
    }

    /// A forwarding proxy connection can carry any plaintext-HTTP origin,
    /// not just its own (the proxy's) — that's the whole point of
    /// forwarding.
    fn can_handle_request(&self, origin: &Origin) -> bool {
        Self::can_handle_request(origin)
    }

    fn info(&self) -> String {
        format!("forward-proxy via {}", self.connection.info())
    }

    async fn handle_request(
        &self,
        request: &mut Request,
        timeouts: TimeoutConfig,
    ) -> std::result::Result<Response, HandleRequestError> {
        self.prepare_request(request);
        self.connection.handle_request(request, timeouts).await
    }

    async fn close(&self) {
        self.connection.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wireclient_types::Url;

    #[test]
    fn only_plain_http_targets_are_handled() {
        let http = Url::parse("http://example.com/").unwrap().origin();
        let https = Url::parse("https://example.com/").unwrap().origin();
        assert!(ForwardingProxy::can_handle_request(&http));
        assert!(!ForwardingProxy::can_handle_request(&https));
    }

    #[test]
    fn prepare_request_rewrites_target_and_merges_headers() {
        let mut proxy_headers = Headers::new();
        proxy_headers.push("Proxy-Authorization", "Basic abc");
        proxy_headers.push("X-Forwarded-By", "proxy");

        let proxy_origin = Url::parse("http://proxy.example:3128/").unwrap().origin();
        let connection = Connection::new(
            proxy_origin,
            Arc::new(wireclient_backend::TokioBackend),
            wireclient_backend::tls::default_client_config().unwrap(),
            PoolConfig::default(),
            Http2Config::default(),
        );
        let forwarding = ForwardingProxy { connection, proxy_headers };

        let url = Url::parse("http://origin.example/path?q=1").unwrap();
        let mut headers = Headers::new();
        headers.push("X-Forwarded-By", "caller");
        let mut request = Request::new("GET", url, headers, Bytes::new());

        forwarding.prepare_request(&mut request);

        assert_eq!(
            request.extensions.target_override.as_deref(),
            Some(b"http://origin.example/path?q=1".as_ref())
        );
        assert_eq!(request.headers.get("Proxy-Authorization"), Some(b"Basic abc".as_ref()));
        // The caller's own header wins over the proxy-injected one.
        assert_eq!(request.headers.get("X-Forwarded-By"), Some(b"caller".as_ref()));
    }
}
